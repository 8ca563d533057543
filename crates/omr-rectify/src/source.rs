//! Polymorphic corner source (§9): the three rectification strategies share
//! a single capability, `produce_quad(image) -> (image, warnings)`, selected
//! as a tagged variant instead of a conditional cascade.
//!
//! The rough and fine passes run in *different* coordinate spaces: the
//! rough quad is found in the raw photographed image and used to warp it
//! onto the canonical `(page_w, page_h)` rectangle with no inset
//! (`worker.py`'s `rough_page_warp`); the fine (corner-square / inner-marker)
//! pass then runs on *that* intermediate page-sized buffer, and its quad is
//! warped again onto the same rectangle, this time inset by 3%
//! (`fine_warp_with_corners`). Chaining a single quad through one warp call
//! would search the fine pass's 15%W x 12%H corner strips against the raw
//! photo's arbitrary skew/rotation instead of the rectified page.

use omr_core::{GrayImage, GrayImageView, PagePoint, RecoverableError};

use crate::quad::{fine_quad, rough_quad};
use crate::warp::rectify_page;

/// Which strategy produced the final rectified image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CornerSource {
    /// Caller supplied the quad directly; no detection ran.
    Override,
    /// Rough pass succeeded, and the fine (corner-square) pass refined it.
    RoughThenFine,
    /// Fine pass failed; the rough pass's warp was used as-is.
    RoughOnly,
}

pub struct QuadResult {
    pub image: GrayImage,
    pub source: CornerSource,
    pub warnings: Vec<RecoverableError>,
}

/// Auto-detect whether `pts` are normalized `[0,1]` coordinates (all values
/// `<= 1.5`) and scale them to image pixels if so.
fn denormalize_if_needed(pts: [PagePoint; 4], w: usize, h: usize) -> [PagePoint; 4] {
    let max_coord = pts
        .iter()
        .flat_map(|p| [p.x, p.y])
        .fold(0.0f32, f32::max);
    if max_coord <= 1.5 {
        pts.map(|p| PagePoint::new(p.x * w as f32, p.y * h as f32))
    } else {
        pts
    }
}

fn as_view(img: &GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width,
        height: img.height,
        data: &img.data,
    }
}

/// Crop (or zero-pad) `img` to `(w, h)` without any warp, the last-resort
/// fallback when a homography can't be estimated at all.
fn crop_or_pad(img: &GrayImageView<'_>, w: usize, h: usize) -> GrayImage {
    let mut data = vec![0u8; w * h];
    for y in 0..h.min(img.height) {
        for x in 0..w.min(img.width) {
            data[y * w + x] = img.data[y * img.width + x];
        }
    }
    GrayImage { width: w, height: h, data }
}

/// Produce the final rectified page by the priority order of §4.1: override,
/// then rough warp refined by the fine (corner-square / inner-marker) pass.
pub fn produce_quad(
    img: &GrayImageView<'_>,
    override_corners: Option<[PagePoint; 4]>,
    page_w: usize,
    page_h: usize,
) -> QuadResult {
    if let Some(pts) = override_corners {
        let quad = denormalize_if_needed(pts, img.width, img.height);
        let image = rectify_page(img, &quad, page_w, page_h, false).unwrap_or_else(|_| crop_or_pad(img, page_w, page_h));
        return QuadResult {
            image,
            source: CornerSource::Override,
            warnings: Vec::new(),
        };
    }

    let rough = rough_quad(img);
    let intermediate = match rectify_page(img, &rough, page_w, page_h, false) {
        Ok(im) => im,
        Err(_) => {
            return QuadResult {
                image: crop_or_pad(img, page_w, page_h),
                source: CornerSource::RoughOnly,
                warnings: vec![RecoverableError::CornersMissing],
            }
        }
    };

    let intermediate_view = as_view(&intermediate);
    match fine_quad(&intermediate_view) {
        Some(fine) => {
            let image = rectify_page(&intermediate_view, &fine, page_w, page_h, true).unwrap_or(intermediate);
            QuadResult {
                image,
                source: CornerSource::RoughThenFine,
                warnings: Vec::new(),
            }
        }
        None => QuadResult {
            image: intermediate,
            source: CornerSource::RoughOnly,
            warnings: vec![RecoverableError::CornersMissing],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_override_is_scaled_and_warped_to_the_page_rect() {
        let pts = [
            PagePoint::new(0.0, 0.0),
            PagePoint::new(1.0, 0.0),
            PagePoint::new(1.0, 1.0),
            PagePoint::new(0.0, 1.0),
        ];
        let data = vec![255u8; 100 * 50];
        let view = GrayImageView {
            width: 100,
            height: 50,
            data: &data,
        };
        let result = produce_quad(&view, Some(pts), 100, 50);
        assert_eq!(result.source, CornerSource::Override);
        assert_eq!(result.image.width, 100);
        assert_eq!(result.image.height, 50);
    }

    #[test]
    fn fine_pass_runs_against_the_intermediate_canonical_buffer() {
        // A blank page has no foreground at all, so the rough pass falls
        // back to the image's own corners and the fine pass necessarily
        // fails (no corner markers to find) regardless of coordinate space;
        // this just exercises that the two-stage path doesn't panic and
        // still yields a page-sized image with RoughOnly attribution.
        let w = 120;
        let h = 90;
        let data = vec![255u8; w * h];
        let view = GrayImageView {
            width: w,
            height: h,
            data: &data,
        };
        let result = produce_quad(&view, None, w, h);
        assert_eq!(result.source, CornerSource::RoughOnly);
        assert_eq!(result.image.width, w);
        assert_eq!(result.image.height, h);
        assert_eq!(result.warnings, vec![RecoverableError::CornersMissing]);
    }
}

//! Page rectification (C1): warp the photographed sheet into a canonical
//! `W x H` coordinate system using corner fiducials, an overridden quad, or
//! a best-effort fallback.

mod order;
mod quad;
mod source;
mod warp;

pub use order::order_points;
pub use quad::{fine_quad, rough_quad};
pub use source::{produce_quad, CornerSource, QuadResult};
pub use warp::{rectify_page, RectifyError};

use log::{info, warn};
use omr_core::{GrayImage, GrayImageView, PagePoint, RecoverableError};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Outcome of rectifying one input page.
pub struct RectifiedPage {
    pub image: GrayImage,
    pub corners_found: bool,
    pub source: CornerSource,
    pub warnings: Vec<RecoverableError>,
}

/// Rectify `src` to a canonical `(page_w, page_h)` page.
///
/// Tries, in order: an external override quad, then a rough-warp pass
/// refined by a fine corner-square/inner-marker pass (§4.1). On total
/// detection failure this still returns a best-effort image (rough quad,
/// or the image's own corners) plus `corners_found = false` and a warning —
/// downstream stages always get an image to work with.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip(src), fields(w = src.width, h = src.height)))]
pub fn rectify(
    src: &GrayImageView<'_>,
    override_corners: Option<[PagePoint; 4]>,
    page_w: usize,
    page_h: usize,
) -> RectifiedPage {
    let quad_result = produce_quad(src, override_corners, page_w, page_h);
    let corners_found = !matches!(quad_result.source, CornerSource::RoughOnly);

    if !corners_found {
        warn!("corner fiducials not found, falling back to rough warp");
    } else {
        info!("corner source resolved via {:?}", quad_result.source);
    }

    RectifiedPage {
        image: quad_result.image,
        corners_found,
        source: quad_result.source,
        warnings: quad_result.warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectify_with_override_corners_succeeds() {
        let w = 80;
        let h = 60;
        let data = vec![200u8; w * h];
        let view = GrayImageView {
            width: w,
            height: h,
            data: &data,
        };
        let quad = [
            PagePoint::new(0.0, 0.0),
            PagePoint::new(w as f32 - 1.0, 0.0),
            PagePoint::new(w as f32 - 1.0, h as f32 - 1.0),
            PagePoint::new(0.0, h as f32 - 1.0),
        ];
        let result = rectify(&view, Some(quad), w, h);
        assert!(result.corners_found);
        assert_eq!(result.source, CornerSource::Override);
        assert_eq!(result.image.width, w);
    }
}

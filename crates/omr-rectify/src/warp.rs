//! Global-homography page rectification: order the source quad, inset the
//! destination rectangle by 3%, estimate H, and warp.

use omr_core::{homography_from_4pt, warp_perspective_gray, GrayImage, GrayImageView, PagePoint};

use crate::order::order_points;

#[derive(thiserror::Error, Debug)]
pub enum RectifyError {
    #[error("homography estimation failed")]
    HomographyFailed,
}

/// Warp `src` so that `quad` (any point order) maps onto a `(w, h)` canonical
/// page. `inset` controls whether the destination rectangle is shrunk by 3%
/// of `(w, h)` from each edge first: only the fine-pass warp of the
/// rough-then-fine strategy carries this inset (`worker.py`'s
/// `fine_warp_with_corners`); the rough pass and the override/rough-only
/// paths warp to the full rectangle (`rough_page_warp`, `apply_override_corners`).
pub fn rectify_page(
    src: &GrayImageView<'_>,
    quad: &[PagePoint; 4],
    w: usize,
    h: usize,
    inset: bool,
) -> Result<GrayImage, RectifyError> {
    let ordered = order_points(quad);
    let src_pts = [
        nalgebra::Point2::new(ordered[0].x, ordered[0].y),
        nalgebra::Point2::new(ordered[1].x, ordered[1].y),
        nalgebra::Point2::new(ordered[2].x, ordered[2].y),
        nalgebra::Point2::new(ordered[3].x, ordered[3].y),
    ];

    let (inset_x, inset_y) = if inset {
        (0.03 * w as f32, 0.03 * h as f32)
    } else {
        (0.0, 0.0)
    };
    let dst_pts = [
        nalgebra::Point2::new(inset_x, inset_y),
        nalgebra::Point2::new(w as f32 - inset_x, inset_y),
        nalgebra::Point2::new(w as f32 - inset_x, h as f32 - inset_y),
        nalgebra::Point2::new(inset_x, h as f32 - inset_y),
    ];

    // homography_from_4pt maps src->dst; we need dst(page)->src(image) to warp.
    let h_img_from_page =
        homography_from_4pt(&dst_pts, &src_pts).ok_or(RectifyError::HomographyFailed)?;

    Ok(warp_perspective_gray(src, h_img_from_page, w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectifies_an_already_aligned_page() {
        let w = 50usize;
        let h = 40usize;
        let data = vec![128u8; w * h];
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
        let out = rectify_page(&view, &quad, w, h, true).expect("rectify");
        assert_eq!(out.width, w);
        assert_eq!(out.height, h);
    }

    #[test]
    fn no_inset_warp_maps_quad_onto_the_full_rectangle() {
        let w = 50usize;
        let h = 40usize;
        let data = vec![128u8; w * h];
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
        let out = rectify_page(&view, &quad, w, h, false).expect("rectify");
        assert_eq!(out.width, w);
        assert_eq!(out.height, h);
    }
}

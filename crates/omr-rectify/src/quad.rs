//! Corner-fiducial / page-boundary quadrilateral detection.
//!
//! The donor stack has no pure-Rust contour finder (the original relies on
//! `cv2.findContours`/`approxPolyDP`). Rather than fabricate an `opencv`
//! binding, both passes below are re-expressed as a deterministic scan over
//! the Otsu-thresholded mask (`omr-threshold`), which is the pack-idiomatic
//! way to find blob-like features without OpenCV: the rough pass finds the
//! four extremal mask pixels along the `x+y`/`x-y` diagonals (the same
//! quantities `order_points` uses downstream), and the fine pass finds the
//! ink centroid inside each corner strip. This keeps the contract
//! (`Option<[PagePoint; 4]>` in image pixels) identical to what a contour
//! finder would have produced.

use omr_core::{GrayImageView, PagePoint};
use omr_threshold::otsu_threshold_from_samples;

/// Binarize `img` by Otsu threshold, inverted so that *dark* ink is
/// foreground (`true`).
fn otsu_foreground_mask(img: &GrayImageView<'_>) -> Vec<bool> {
    let t = otsu_threshold_from_samples(img.data);
    img.data.iter().map(|&v| v <= t).collect()
}

/// Rough pass: find the largest foreground region's bounding quadrilateral
/// by locating the four mask pixels extremal along `x+y` and `x-y`. Falls
/// back to the image's own corners if the mask has no foreground at all.
pub fn rough_quad(img: &GrayImageView<'_>) -> [PagePoint; 4] {
    let mask = otsu_foreground_mask(img);
    let w = img.width;
    let h = img.height;

    let mut min_sum = (f32::INFINITY, PagePoint::new(0.0, 0.0));
    let mut max_sum = (f32::NEG_INFINITY, PagePoint::new(0.0, 0.0));
    let mut min_diff = (f32::INFINITY, PagePoint::new(0.0, 0.0));
    let mut max_diff = (f32::NEG_INFINITY, PagePoint::new(0.0, 0.0));
    let mut any = false;

    for y in 0..h {
        for x in 0..w {
            if !mask[y * w + x] {
                continue;
            }
            any = true;
            let p = PagePoint::new(x as f32, y as f32);
            let s = p.x + p.y;
            let d = p.x - p.y;
            if s < min_sum.0 {
                min_sum = (s, p);
            }
            if s > max_sum.0 {
                max_sum = (s, p);
            }
            if d < min_diff.0 {
                min_diff = (d, p);
            }
            if d > max_diff.0 {
                max_diff = (d, p);
            }
        }
    }

    if !any {
        return [
            PagePoint::new(0.0, 0.0),
            PagePoint::new(w as f32 - 1.0, 0.0),
            PagePoint::new(w as f32 - 1.0, h as f32 - 1.0),
            PagePoint::new(0.0, h as f32 - 1.0),
        ];
    }

    // TL, TR, BR, BL
    [min_sum.1, min_diff.1, max_sum.1, max_diff.1]
}

struct QuadrantStrip {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

fn quadrant_strips(w: usize, h: usize) -> [QuadrantStrip; 4] {
    let sx = ((w as f32) * 0.15).round() as usize;
    let sy = ((h as f32) * 0.12).round() as usize;
    [
        QuadrantStrip {
            x0: 0,
            y0: 0,
            x1: sx,
            y1: sy,
        }, // TL
        QuadrantStrip {
            x0: w.saturating_sub(sx),
            y0: 0,
            x1: w,
            y1: sy,
        }, // TR
        QuadrantStrip {
            x0: w.saturating_sub(sx),
            y0: h.saturating_sub(sy),
            x1: w,
            y1: h,
        }, // BR
        QuadrantStrip {
            x0: 0,
            y0: h.saturating_sub(sy),
            x1: sx,
            y1: h,
        }, // BL
    ]
}

/// Minimum fraction of foreground pixels within a corner strip for it to
/// count as a detected marker (stand-in for the area/aspect-ratio gates of
/// the original contour-based detector).
const MIN_STRIP_FOREGROUND_FRAC: f32 = 0.02;

/// Fine pass: for each of the four corner strips (15%W × 12%H), compute the
/// ink centroid. Succeeds only if all four strips contain enough foreground
/// to plausibly be a printed corner marker.
pub fn fine_quad(img: &GrayImageView<'_>) -> Option<[PagePoint; 4]> {
    let mask = otsu_foreground_mask(img);
    let w = img.width;
    let strips = quadrant_strips(img.width, img.height);

    let mut corners = [PagePoint::new(0.0, 0.0); 4];
    for (i, strip) in strips.iter().enumerate() {
        let mut sum_x = 0.0f64;
        let mut sum_y = 0.0f64;
        let mut count = 0usize;
        for y in strip.y0..strip.y1 {
            for x in strip.x0..strip.x1 {
                if mask[y * w + x] {
                    sum_x += x as f64;
                    sum_y += y as f64;
                    count += 1;
                }
            }
        }
        let area = ((strip.x1 - strip.x0) * (strip.y1 - strip.y0)).max(1);
        if (count as f32 / area as f32) < MIN_STRIP_FOREGROUND_FRAC {
            return None;
        }
        corners[i] = PagePoint::new((sum_x / count as f64) as f32, (sum_y / count as f64) as f32);
    }

    Some(corners)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_white(w: usize, h: usize) -> Vec<u8> {
        vec![255u8; w * h]
    }

    fn paint_square(data: &mut [u8], w: usize, x0: usize, y0: usize, size: usize, v: u8) {
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                data[y * w + x] = v;
            }
        }
    }

    #[test]
    fn rough_quad_falls_back_to_image_corners_on_blank_page() {
        let w = 100;
        let h = 100;
        let data = make_white(w, h);
        let view = GrayImageView {
            width: w,
            height: h,
            data: &data,
        };
        // A pure-white page is entirely "foreground" under Otsu when
        // min==max, so the fallback path still must produce valid corners.
        let q = rough_quad(&view);
        assert!(q[0].x <= q[2].x && q[0].y <= q[2].y);
    }

    #[test]
    fn fine_quad_detects_four_corner_squares() {
        let w = 200;
        let h = 200;
        let mut data = make_white(w, h);
        paint_square(&mut data, w, 2, 2, 10, 0);
        paint_square(&mut data, w, w - 12, 2, 10, 0);
        paint_square(&mut data, w, w - 12, h - 12, 10, 0);
        paint_square(&mut data, w, 2, h - 12, 10, 0);
        let view = GrayImageView {
            width: w,
            height: h,
            data: &data,
        };
        let q = fine_quad(&view).expect("four corner markers detected");
        assert!(q[0].x < q[1].x);
        assert!(q[0].y < q[2].y);
    }

    #[test]
    fn fine_quad_fails_when_one_corner_missing() {
        let w = 200;
        let h = 200;
        let mut data = make_white(w, h);
        paint_square(&mut data, w, 2, 2, 10, 0);
        paint_square(&mut data, w, w - 12, 2, 10, 0);
        paint_square(&mut data, w, w - 12, h - 12, 10, 0);
        // bottom-left marker intentionally omitted
        let view = GrayImageView {
            width: w,
            height: h,
            data: &data,
        };
        assert!(fine_quad(&view).is_none());
    }
}

//! Circle detection (C3, first half): find answer-bubble candidates in the
//! rectified `gray` page.
//!
//! The donor workspace and the rest of the examples pack have no pure-Rust
//! equivalent of `cv2.HoughCircles` (OpenCV's Hough transform has no
//! dependency-real Rust port in this stack's graph). This module instead
//! finds circle-shaped blobs by connected-component labeling of a
//! downscaled, Otsu-binarized ink mask: each blob's area gives an
//! equivalent radius (`r = sqrt(area / pi)`), its bounding-box aspect ratio
//! filters out non-circular ink (text, rules), and a looser retry pass
//! mirrors the two-pass `param2` relaxation of §4.3 when too few survive.
//! The stage's contract — `Vec<Circle>` in page pixels, scale-independent —
//! is unchanged.

use omr_core::Circle;
use omr_threshold::otsu_threshold_from_samples;

use crate::preprocess::box_blur_3x3;

/// Fixed downscale width circle detection runs at, matching §4.3's `Wd`.
pub const DOWNSCALE_WIDTH: usize = 1200;

const MIN_RADIUS_PAGE: f32 = 6.0;
const MAX_RADIUS_PAGE: f32 = 16.0;
/// Retry with a looser (more permissive) threshold offset if the strict
/// pass yields fewer than this many circles.
const MIN_CIRCLES_BEFORE_RETRY: usize = 300;
/// Bounding-box aspect ratio window a blob must fall within to count as
/// circle-like rather than a stray ink stroke.
const BLOB_ASPECT_MIN: f32 = 0.6;
const BLOB_ASPECT_MAX: f32 = 1.7;

struct DownscaledGray {
    width: usize,
    height: usize,
    data: Vec<u8>,
    scale: f32,
}

fn downscale_gray(gray: &omr_core::GrayImage, target_width: usize) -> DownscaledGray {
    let w = gray.width;
    let h = gray.height;
    if w <= target_width {
        return DownscaledGray {
            width: w,
            height: h,
            data: gray.data.clone(),
            scale: 1.0,
        };
    }
    let scale = target_width as f32 / w as f32;
    let dw = target_width.max(1);
    let dh = ((h as f32) * scale).round().max(1.0) as usize;
    let mut data = vec![0u8; dw * dh];
    for y in 0..dh {
        let sy = ((y as f32 + 0.5) / scale).floor().min(h as f32 - 1.0) as usize;
        for x in 0..dw {
            let sx = ((x as f32 + 0.5) / scale).floor().min(w as f32 - 1.0) as usize;
            data[y * dw + x] = gray.data[sy * w + sx];
        }
    }
    DownscaledGray {
        width: dw,
        height: dh,
        data,
        scale,
    }
}

/// Binarize the downscaled, blurred page: a pixel is foreground (ink) when
/// it is at least `slack` below the Otsu cut. `slack = 0` is the strict
/// pass; a positive `slack` is the looser retry.
fn ink_mask(data: &[u8], slack: i32) -> Vec<bool> {
    let otsu = otsu_threshold_from_samples(data) as i32;
    let cut = (otsu + slack).clamp(0, 255) as u8;
    data.iter().map(|&v| v <= cut).collect()
}

struct Blob {
    count: usize,
    x_min: usize,
    x_max: usize,
    y_min: usize,
    y_max: usize,
}

/// Iterative (stack-based) flood fill connected-component labeling over a
/// boolean foreground mask, 4-connected.
fn connected_components(mask: &[bool], w: usize, h: usize) -> Vec<Blob> {
    let mut visited = vec![false; w * h];
    let mut blobs = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for y0 in 0..h {
        for x0 in 0..w {
            let idx0 = y0 * w + x0;
            if !mask[idx0] || visited[idx0] {
                continue;
            }
            visited[idx0] = true;
            stack.push((x0, y0));
            let mut count = 0usize;
            let (mut x_min, mut x_max, mut y_min, mut y_max) = (x0, x0, y0, y0);

            while let Some((x, y)) = stack.pop() {
                count += 1;
                x_min = x_min.min(x);
                x_max = x_max.max(x);
                y_min = y_min.min(y);
                y_max = y_max.max(y);

                let neighbors = [
                    (x.wrapping_sub(1), y),
                    (x + 1, y),
                    (x, y.wrapping_sub(1)),
                    (x, y + 1),
                ];
                for (nx, ny) in neighbors {
                    if nx >= w || ny >= h {
                        continue;
                    }
                    let nidx = ny * w + nx;
                    if mask[nidx] && !visited[nidx] {
                        visited[nidx] = true;
                        stack.push((nx, ny));
                    }
                }
            }
            blobs.push(Blob {
                count,
                x_min,
                x_max,
                y_min,
                y_max,
            });
        }
    }
    blobs
}

/// Run one detection pass at a given threshold `slack`, returning circles in
/// original page-pixel coordinates.
fn detect_pass(ds: &DownscaledGray, min_r: f32, max_r: f32, slack: i32) -> Vec<Circle> {
    let mask = ink_mask(&ds.data, slack);
    let blobs = connected_components(&mask, ds.width, ds.height);

    let mut circles = Vec::new();
    for b in blobs {
        let bw = (b.x_max - b.x_min + 1) as f32;
        let bh = (b.y_max - b.y_min + 1) as f32;
        if bh <= 0.0 {
            continue;
        }
        let aspect = bw / bh;
        if aspect < BLOB_ASPECT_MIN || aspect > BLOB_ASPECT_MAX {
            continue;
        }
        let area = b.count as f32;
        let r = (area / std::f32::consts::PI).sqrt();
        if r < min_r || r > max_r {
            continue;
        }
        let cx = (b.x_min as f32 + b.x_max as f32) / 2.0 + 0.5;
        let cy = (b.y_min as f32 + b.y_max as f32) / 2.0 + 0.5;
        circles.push(Circle::new(cx / ds.scale, cy / ds.scale, r / ds.scale));
    }
    circles
}

/// Detect answer-bubble candidates in `gray` (§4.3 `detect_circles`):
/// downscale to [`DOWNSCALE_WIDTH`], blur, binarize, and label connected
/// ink blobs whose size and aspect ratio are circle-like. If the strict
/// pass finds fewer than [`MIN_CIRCLES_BEFORE_RETRY`] circles, retry once
/// with a looser (wider) ink cut.
pub fn detect_circles(gray: &omr_core::GrayImage) -> Vec<Circle> {
    let ds_raw = downscale_gray(gray, DOWNSCALE_WIDTH);
    let blurred = box_blur_3x3(&ds_raw.data, ds_raw.width, ds_raw.height);
    let ds = DownscaledGray {
        width: ds_raw.width,
        height: ds_raw.height,
        data: blurred,
        scale: ds_raw.scale,
    };

    let min_r = (MIN_RADIUS_PAGE * ds.scale).max(4.0);
    let max_r = (MAX_RADIUS_PAGE * ds.scale).max(10.0);

    let strict = detect_pass(&ds, min_r, max_r, 0);
    if strict.len() >= MIN_CIRCLES_BEFORE_RETRY {
        return strict;
    }
    let loose = detect_pass(&ds, min_r, max_r, 25);
    if loose.len() > strict.len() {
        loose
    } else {
        strict
    }
}

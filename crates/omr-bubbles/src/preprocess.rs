//! Preprocessing (C2): derive `binary` and `gray_clahe` buffers from the
//! rectified `gray` page. Both are deterministic, pure functions of the
//! input image.

use omr_core::GrayImage;
use omr_threshold::otsu_threshold_from_samples;

/// Block size (in pixels) of the local neighborhood used by [`adaptive_threshold`].
const ADAPTIVE_BLOCK: usize = 25;
/// Constant subtracted from the local mean before thresholding, matching the
/// ink-favoring bias of an `ADAPTIVE_THRESH_MEAN_C` pass.
const ADAPTIVE_C: i32 = 10;

/// Separable 3x3 box blur, used as a cheap stand-in for the `GaussianBlur(5,5)`
/// smoothing pass ahead of circle detection (§4.3): small enough to preserve
/// bubble edges, large enough to suppress single-pixel scan noise.
pub(crate) fn box_blur_3x3(data: &[u8], w: usize, h: usize) -> Vec<u8> {
    let mut out = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0u32;
            let mut count = 0u32;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let xx = x as i32 + dx;
                    let yy = y as i32 + dy;
                    if xx >= 0 && yy >= 0 && xx < w as i32 && yy < h as i32 {
                        sum += data[yy as usize * w + xx as usize] as u32;
                        count += 1;
                    }
                }
            }
            out[y * w + x] = (sum / count.max(1)) as u8;
        }
    }
    out
}

/// Local-mean adaptive threshold: a pixel is ink (`0`) when it falls more
/// than `ADAPTIVE_C` below the mean of its `ADAPTIVE_BLOCK x ADAPTIVE_BLOCK`
/// neighborhood, background (`255`) otherwise. Followed by a 3x3 morphological
/// open to drop isolated single-pixel ink specks.
pub fn adaptive_threshold(gray: &GrayImage) -> GrayImage {
    let (w, h) = (gray.width, gray.height);
    let half = (ADAPTIVE_BLOCK / 2) as i32;
    let mut raw = vec![255u8; w * h];

    let integral = build_integral(gray);
    for y in 0..h {
        for x in 0..w {
            let x0 = (x as i32 - half).max(0);
            let y0 = (y as i32 - half).max(0);
            let x1 = (x as i32 + half).min(w as i32 - 1);
            let y1 = (y as i32 + half).min(h as i32 - 1);
            let area = ((x1 - x0 + 1) * (y1 - y0 + 1)) as i64;
            let sum = region_sum(&integral, w, x0, y0, x1, y1);
            let mean = (sum / area.max(1)) as i32;
            let v = gray.data[y * w + x] as i32;
            raw[y * w + x] = if v < mean - ADAPTIVE_C { 0 } else { 255 };
        }
    }

    GrayImage {
        width: w,
        height: h,
        data: morphological_open(&raw, w, h),
    }
}

fn build_integral(gray: &GrayImage) -> Vec<i64> {
    let (w, h) = (gray.width, gray.height);
    let mut integral = vec![0i64; (w + 1) * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0i64;
        for x in 0..w {
            row_sum += gray.data[y * w + x] as i64;
            integral[(y + 1) * (w + 1) + (x + 1)] = integral[y * (w + 1) + (x + 1)] + row_sum;
        }
    }
    integral
}

fn region_sum(integral: &[i64], w: usize, x0: i32, y0: i32, x1: i32, y1: i32) -> i64 {
    let stride = w + 1;
    let a = integral[(y0 as usize) * stride + (x0 as usize)];
    let b = integral[(y0 as usize) * stride + (x1 as usize + 1)];
    let c = integral[(y1 as usize + 1) * stride + (x0 as usize)];
    let d = integral[(y1 as usize + 1) * stride + (x1 as usize + 1)];
    d - b - c + a
}

/// 3x3 morphological open (erode then dilate) on a binary `{0, 255}` buffer,
/// treating `0` as foreground (ink).
fn morphological_open(data: &[u8], w: usize, h: usize) -> Vec<u8> {
    let eroded = erode3(data, w, h);
    dilate3(&eroded, w, h)
}

fn erode3(data: &[u8], w: usize, h: usize) -> Vec<u8> {
    let mut out = vec![255u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut all_fg = true;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let xx = x as i32 + dx;
                    let yy = y as i32 + dy;
                    if xx < 0 || yy < 0 || xx >= w as i32 || yy >= h as i32 {
                        all_fg = false;
                    } else if data[yy as usize * w + xx as usize] != 0 {
                        all_fg = false;
                    }
                }
            }
            out[y * w + x] = if all_fg { 0 } else { 255 };
        }
    }
    out
}

fn dilate3(data: &[u8], w: usize, h: usize) -> Vec<u8> {
    let mut out = vec![255u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut any_fg = false;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let xx = x as i32 + dx;
                    let yy = y as i32 + dy;
                    if xx >= 0 && yy >= 0 && xx < w as i32 && yy < h as i32 {
                        if data[yy as usize * w + xx as usize] == 0 {
                            any_fg = true;
                        }
                    }
                }
            }
            out[y * w + x] = if any_fg { 0 } else { 255 };
        }
    }
    out
}

/// Tile size for the [`clahe`] local-histogram pass.
const CLAHE_TILE: usize = 8;
/// Clip limit (as a fraction of a flat-distribution bin count) applied
/// before redistributing clipped mass across the histogram.
const CLAHE_CLIP: f32 = 2.0;

/// Contrast-limited adaptive histogram equalization, applied per
/// `CLAHE_TILE x CLAHE_TILE`-pixel grid cell and bilinearly blended across
/// cell boundaries. Used only by the near-miss rescue pass and the
/// GridReader alternative's baseline statistics.
pub fn clahe(gray: &GrayImage) -> GrayImage {
    let (w, h) = (gray.width, gray.height);
    let tiles_x = w.div_ceil(CLAHE_TILE).max(1);
    let tiles_y = h.div_ceil(CLAHE_TILE).max(1);

    let mut maps = vec![[0u8; 256]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * CLAHE_TILE;
            let y0 = ty * CLAHE_TILE;
            let x1 = (x0 + CLAHE_TILE).min(w);
            let y1 = (y0 + CLAHE_TILE).min(h);
            maps[ty * tiles_x + tx] = build_clip_map(gray, x0, y0, x1, y1);
        }
    }

    let mut out = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let v = gray.data[y * w + x] as usize;
            // bilinear blend between the four nearest tile centers
            let fx = (x as f32 / CLAHE_TILE as f32 - 0.5).max(0.0);
            let fy = (y as f32 / CLAHE_TILE as f32 - 0.5).max(0.0);
            let tx0 = (fx.floor() as usize).min(tiles_x - 1);
            let ty0 = (fy.floor() as usize).min(tiles_y - 1);
            let tx1 = (tx0 + 1).min(tiles_x - 1);
            let ty1 = (ty0 + 1).min(tiles_y - 1);
            let ax = fx - tx0 as f32;
            let ay = fy - ty0 as f32;

            let v00 = maps[ty0 * tiles_x + tx0][v] as f32;
            let v10 = maps[ty0 * tiles_x + tx1][v] as f32;
            let v01 = maps[ty1 * tiles_x + tx0][v] as f32;
            let v11 = maps[ty1 * tiles_x + tx1][v] as f32;
            let top = v00 + ax * (v10 - v00);
            let bot = v01 + ax * (v11 - v01);
            out[y * w + x] = (top + ay * (bot - top)).round().clamp(0.0, 255.0) as u8;
        }
    }

    GrayImage {
        width: w,
        height: h,
        data: out,
    }
}

fn build_clip_map(gray: &GrayImage, x0: usize, y0: usize, x1: usize, y1: usize) -> [u8; 256] {
    let w = gray.width;
    let mut hist = [0u32; 256];
    let mut count = 0u32;
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.data[y * w + x] as usize] += 1;
            count += 1;
        }
    }
    if count == 0 {
        let mut identity = [0u8; 256];
        for (i, v) in identity.iter_mut().enumerate() {
            *v = i as u8;
        }
        return identity;
    }

    let clip = ((CLAHE_CLIP * count as f32 / 256.0).max(1.0)) as u32;
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }
    let redistribute = excess / 256;
    for bin in hist.iter_mut() {
        *bin += redistribute;
    }

    let mut cdf = [0u32; 256];
    let mut running = 0u32;
    for (i, &bin) in hist.iter().enumerate() {
        running += bin;
        cdf[i] = running;
    }
    let total = cdf[255].max(1);
    let mut map = [0u8; 256];
    for (i, v) in map.iter_mut().enumerate() {
        *v = ((cdf[i] as f64 / total as f64) * 255.0).round() as u8;
    }
    map
}

/// Otsu's method applied to the page's own luminance histogram, used as a
/// fallback global threshold when a caller wants a single scalar cut rather
/// than the full adaptive `binary` buffer (e.g. the rectifier's corner-mask
/// pass reuses the same primitive via `omr-threshold` directly).
pub fn otsu_global_threshold(gray: &GrayImage) -> f32 {
    otsu_threshold_from_samples(&gray.data) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptive_threshold_marks_a_dark_blob_as_ink() {
        let w = 60;
        let h = 60;
        let mut data = vec![230u8; w * h];
        for y in 20..40 {
            for x in 20..40 {
                data[y * w + x] = 10;
            }
        }
        let gray = GrayImage {
            width: w,
            height: h,
            data,
        };
        let binary = adaptive_threshold(&gray);
        assert_eq!(binary.data[30 * w + 30], 0);
        assert_eq!(binary.data[5 * w + 5], 255);
    }

    #[test]
    fn clahe_preserves_dimensions_and_stays_in_range() {
        let w = 40;
        let h = 32;
        let data: Vec<u8> = (0..w * h).map(|i| (i % 256) as u8).collect();
        let gray = GrayImage {
            width: w,
            height: h,
            data,
        };
        let out = clahe(&gray);
        assert_eq!(out.width, w);
        assert_eq!(out.height, h);
        assert_eq!(out.data.len(), w * h);
    }

    #[test]
    fn otsu_global_threshold_splits_bimodal_page() {
        let mut data = vec![20u8; 50];
        data.extend(vec![220u8; 50]);
        let gray = GrayImage {
            width: 10,
            height: 10,
            data,
        };
        let t = otsu_global_threshold(&gray);
        assert!(t > 20.0 && t < 220.0);
    }
}

//! Polar sampling primitive: mean luminance on a disk/annulus around a
//! point, sampled at a fixed angular step with bilinear interpolation.
//!
//! Adapted from the square-warp ring-contrast sampler used elsewhere in this
//! stack's marker detection: that version samples within a locally-warped
//! patch; this version samples directly in rectified-page pixel space,
//! since every bubble center here already lives in one shared coordinate
//! system (no per-cell homography is needed).

use omr_core::{sample_bilinear, GrayImageView};

/// Mean intensity on a circle of radius `rad` around `(cx, cy)`, sampled at
/// `samples` equally spaced angles.
pub fn sample_circle_mean(
    img: &GrayImageView<'_>,
    cx: f32,
    cy: f32,
    rad: f32,
    samples: usize,
) -> f32 {
    if samples == 0 || rad <= 0.0 {
        return sample_bilinear(img, cx, cy);
    }
    let mut sum = 0.0f32;
    for k in 0..samples {
        let t = (k as f32) * (std::f32::consts::TAU / samples as f32);
        let x = cx + rad * t.cos();
        let y = cy + rad * t.sin();
        sum += sample_bilinear(img, x, y);
    }
    sum / samples as f32
}

/// Mean intensity across the annulus `[r0, r1]`, approximated by averaging
/// two circle samples (correct-first; cheap and sufficient at the radii
/// used by this pipeline).
pub fn sample_annulus_mean(
    img: &GrayImageView<'_>,
    cx: f32,
    cy: f32,
    r0: f32,
    r1: f32,
    samples: usize,
) -> f32 {
    let m0 = sample_circle_mean(img, cx, cy, r0, samples);
    let m1 = sample_circle_mean(img, cx, cy, r1, samples);
    0.5 * (m0 + m1)
}

/// Mean and standard deviation of intensity across the annulus `[r0, r1]`,
/// used where a local background estimate (not just its mean) is needed —
/// e.g. the ink-ratio threshold `mean_bg - std_bg`.
pub fn sample_annulus_mean_std(
    img: &GrayImageView<'_>,
    cx: f32,
    cy: f32,
    r0: f32,
    r1: f32,
    samples: usize,
) -> (f32, f32) {
    if samples == 0 {
        let v = sample_bilinear(img, cx, cy);
        return (v, 0.0);
    }
    let mut values = Vec::with_capacity(samples * 2);
    for &r in &[r0, r1] {
        for k in 0..samples {
            let t = (k as f32) * (std::f32::consts::TAU / samples as f32);
            let x = cx + r * t.cos();
            let y = cy + r * t.sin();
            values.push(sample_bilinear(img, x, y));
        }
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / values.len() as f32;
    (mean, var.sqrt())
}

/// Fraction of samples across the disk `[0, r]` that fall below `ink_threshold`.
pub fn disk_ink_fraction(
    img: &GrayImageView<'_>,
    cx: f32,
    cy: f32,
    r: f32,
    samples: usize,
    ink_threshold: f32,
) -> f32 {
    if samples == 0 {
        return 0.0;
    }
    // Sample a filled disk as a handful of concentric rings so "ink ratio"
    // reflects area, not just the disk's outer rim.
    let rings = 4usize;
    let mut ink = 0usize;
    let mut total = 0usize;
    for ring in 1..=rings {
        let rr = r * ring as f32 / rings as f32;
        for k in 0..samples {
            let t = (k as f32) * (std::f32::consts::TAU / samples as f32);
            let x = cx + rr * t.cos();
            let y = cy + rr * t.sin();
            let v = sample_bilinear(img, x, y);
            if v < ink_threshold {
                ink += 1;
            }
            total += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        ink as f32 / total as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_image(w: usize, h: usize, v: u8) -> Vec<u8> {
        vec![v; w * h]
    }

    #[test]
    fn circle_mean_on_flat_field_equals_field_value() {
        let data = flat_image(64, 64, 200);
        let view = GrayImageView {
            width: 64,
            height: 64,
            data: &data,
        };
        let m = sample_circle_mean(&view, 32.0, 32.0, 10.0, 16);
        assert!((m - 200.0).abs() < 1.0);
    }

    #[test]
    fn annulus_mean_std_is_zero_on_flat_field() {
        let data = flat_image(64, 64, 100);
        let view = GrayImageView {
            width: 64,
            height: 64,
            data: &data,
        };
        let (mean, std) = sample_annulus_mean_std(&view, 32.0, 32.0, 5.0, 9.0, 16);
        assert!((mean - 100.0).abs() < 1.0);
        assert!(std < 1.0);
    }

    #[test]
    fn disk_ink_fraction_detects_dark_disk() {
        let mut data = flat_image(64, 64, 230);
        for y in 0..64 {
            for x in 0..64 {
                let dx = x as f32 - 32.0;
                let dy = y as f32 - 32.0;
                if (dx * dx + dy * dy).sqrt() < 8.0 {
                    data[y * 64 + x] = 20;
                }
            }
        }
        let view = GrayImageView {
            width: 64,
            height: 64,
            data: &data,
        };
        let frac = disk_ink_fraction(&view, 32.0, 32.0, 6.0, 16, 150.0);
        assert!(frac > 0.8, "expected mostly-ink disk, got {frac}");
    }
}

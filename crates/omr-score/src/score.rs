//! Ring-contrast scoring (§4.5): per-choice `score_bubble`/`compute_ink_ratio`
//! and per-row noise/statistics derived from the shared polar-sampling
//! primitive in [`crate::sampling`].

use omr_core::EPS;

use crate::sampling::{sample_annulus_mean, sample_annulus_mean_std, sample_circle_mean};
use omr_core::GrayImageView;

/// Ring-contrast score for one bubble center: mean luminance on the
/// background ring minus the mean on the inner (ink) ring, normalized to
/// `[0, 1]` and floored at zero. A filled (dark) bubble scores high; an
/// empty one scores near zero.
pub fn score_bubble(img: &GrayImageView<'_>, cx: f32, cy: f32, r: f32, samples: usize) -> f32 {
    let mean_inner = sample_annulus_mean(img, cx, cy, 0.35 * r, 0.85 * r, samples);
    let mean_bg = sample_annulus_mean(img, cx, cy, 1.05 * r, 1.35 * r, samples);
    ((mean_bg - mean_inner) / 255.0).max(0.0)
}

/// Fraction of the inner ink zone whose luminance falls below the local
/// background's `mean - 1*std`.
pub fn compute_ink_ratio(img: &GrayImageView<'_>, cx: f32, cy: f32, r: f32, samples: usize) -> f32 {
    let (mean_bg, std_bg) = sample_annulus_mean_std(img, cx, cy, 1.05 * r, 1.35 * r, samples);
    let ink_threshold = mean_bg - std_bg;

    let r0 = 0.28 * r;
    let r1 = 0.75 * r;
    let rings = 4usize;
    let mut ink = 0usize;
    let mut total = 0usize;
    for ring in 1..=rings {
        let rr = r0 + (r1 - r0) * ring as f32 / rings as f32;
        for k in 0..samples {
            let t = (k as f32) * (std::f32::consts::TAU / samples as f32);
            let x = cx + rr * t.cos();
            let y = cy + rr * t.sin();
            let v = omr_core::sample_bilinear(img, x, y);
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

/// Normalized contrast at the midpoint between two adjacent choice centers,
/// used to detect stray ink/smudges that could be mistaken for a mark.
/// Evaluates the disk `rho <= 0.22r` and the ring `0.95r-1.20r`, each against
/// the background `rho >= 1.20r`, and returns the larger of the two.
pub fn compute_noise_at_midpoint(
    img: &GrayImageView<'_>,
    mx: f32,
    my: f32,
    r: f32,
    samples: usize,
) -> f32 {
    let mean_bg = sample_circle_mean(img, mx, my, 1.20 * r, samples);
    let mean_disk = sample_circle_mean(img, mx, my, 0.22 * r * 0.5, samples);
    let mean_ring = sample_annulus_mean(img, mx, my, 0.95 * r, 1.20 * r, samples);
    let disk_contrast = ((mean_bg - mean_disk) / 255.0).max(0.0);
    let ring_contrast = ((mean_bg - mean_ring) / 255.0).max(0.0);
    disk_contrast.max(ring_contrast)
}

/// `noise_max` for one row: the maximum [`compute_noise_at_midpoint`] over
/// the four midpoints between the five adjacent choice centers.
pub fn row_noise_max(img: &GrayImageView<'_>, coords: &[(f32, f32); 5], r: f32, samples: usize) -> f32 {
    let mut max_noise = 0.0f32;
    for pair in coords.windows(2) {
        let (ax, ay) = pair[0];
        let (bx, by) = pair[1];
        let mx = 0.5 * (ax + bx);
        let my = 0.5 * (ay + by);
        let n = compute_noise_at_midpoint(img, mx, my, r, samples);
        max_noise = max_noise.max(n);
    }
    max_noise
}

/// Median of a slice of scores (sorted copy; not sensitive to input order).
pub fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}

/// Population standard deviation, floored with [`EPS`] by the caller where needed.
pub fn std_dev(values: &[f32], mean: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / values.len() as f32;
    var.sqrt()
}

/// Per-row summary statistics over the five choice scores in one question.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RowStats {
    pub best: f32,
    pub second: f32,
    pub delta: f32,
    pub row_median: f32,
    pub row_std: f32,
    pub z: f32,
    pub best_idx: usize,
}

/// Compute best/second/delta/median/std/z for one row's five scores.
pub fn row_stats(scores: &[f32; 5]) -> RowStats {
    let mut idx: Vec<usize> = (0..5).collect();
    idx.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap());
    let best_idx = idx[0];
    let best = scores[best_idx];
    let second = scores[idx[1]];
    let delta = best - second;
    let row_median = median(scores);
    let row_std = std_dev(scores, scores.iter().sum::<f32>() / 5.0);
    let z = (best - row_median) / (row_std + EPS);
    RowStats {
        best,
        second,
        delta,
        row_median,
        row_std,
        z,
        best_idx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk_image(w: usize, h: usize, bg: u8) -> Vec<u8> {
        vec![bg; w * h]
    }

    fn paint_disk(data: &mut [u8], w: usize, cx: f32, cy: f32, r: f32, v: u8) {
        let h = data.len() / w;
        for y in 0..h {
            for x in 0..w {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                if (dx * dx + dy * dy).sqrt() < r {
                    data[y * w + x] = v;
                }
            }
        }
    }

    #[test]
    fn score_bubble_is_high_for_a_filled_mark() {
        let w = 100;
        let h = 100;
        let mut data = disk_image(w, h, 240);
        paint_disk(&mut data, w, 50.0, 50.0, 9.0, 20);
        let view = GrayImageView {
            width: w,
            height: h,
            data: &data,
        };
        let s = score_bubble(&view, 50.0, 50.0, 10.0, 24);
        assert!(s > 0.5, "expected strong score for filled mark, got {s}");
    }

    #[test]
    fn score_bubble_is_near_zero_for_blank_field() {
        let w = 100;
        let h = 100;
        let data = disk_image(w, h, 240);
        let view = GrayImageView {
            width: w,
            height: h,
            data: &data,
        };
        let s = score_bubble(&view, 50.0, 50.0, 10.0, 24);
        assert!(s < 0.05, "expected near-zero score on blank field, got {s}");
    }

    #[test]
    fn row_stats_picks_the_strongest_choice() {
        let scores = [0.05, 0.02, 0.8, 0.03, 0.04];
        let stats = row_stats(&scores);
        assert_eq!(stats.best_idx, 2);
        assert!((stats.best - 0.8).abs() < 1e-6);
        assert!(stats.delta > 0.7);
        assert!(stats.z > 1.0);
    }

    #[test]
    fn median_of_even_length_averages_middle_pair() {
        assert!((median(&[1.0, 2.0, 3.0, 4.0]) - 2.5).abs() < 1e-6);
    }
}

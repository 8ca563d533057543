//! Gated rescue passes (§4.6, §9): optional second-chance re-scoring for
//! rows that fell into a rejecting tier on the first pass. Both functions
//! are unit-tested here but never invoked from the default decision flow —
//! the facade only calls them when [`omr_core::PipelineConfig::rescue_passes`]
//! is explicitly set, which defaults to `false`.
//!
//! Kept disabled by default because in practice they trade a handful of
//! recovered faint marks for a larger number of false positives.

use omr_core::{GrayImageView, Tier};
use omr_score::score_bubble;

use crate::tiers::{decide_row, Decision, RowSignals};

/// Tiers eligible for a rescue attempt: a row that already resolved to an
/// answer, or one the noise veto rejected outright, is left untouched.
fn eligible_for_rescue(tier: Tier) -> bool {
    matches!(tier, Tier::Blank | Tier::LowConf | Tier::Multi)
}

/// Re-score a row's five choice centers at a small set of alternate radii,
/// on the theory that a slightly mis-sized bubble estimate suppressed its
/// true contrast. Returns a rescued [`Decision`] only if it resolves to a
/// strictly better (non-ambiguous, non-blank) tier than `original`.
pub fn targeted_rescue(
    img: &GrayImageView<'_>,
    coords: &[(f32, f32); 5],
    r: f32,
    samples: usize,
    signals: &RowSignals,
    thresholds: &omr_core::Thresholds,
    original_tier: Tier,
) -> Option<Decision> {
    if !eligible_for_rescue(original_tier) {
        return None;
    }

    const RADIUS_SCALES: [f32; 3] = [0.9, 1.0, 1.1];
    let mut best_scores = [0.0f32; 5];
    let mut best_total = f32::NEG_INFINITY;

    for &scale in &RADIUS_SCALES {
        let mut scores = [0.0f32; 5];
        for (i, &(x, y)) in coords.iter().enumerate() {
            scores[i] = score_bubble(img, x, y, r * scale, samples);
        }
        let total: f32 = scores.iter().sum();
        if total > best_total {
            best_total = total;
            best_scores = scores;
        }
    }

    let stats = omr_score::row_stats(&best_scores);
    let rescued_signals = RowSignals {
        stats,
        ink_ratio: signals.ink_ratio,
        noise_gap: signals.noise_gap,
        median_ink: signals.median_ink,
        stability_ok: signals.stability_ok,
    };
    let decision = decide_row(&rescued_signals, thresholds, false, false);
    if matches!(decision.tier, Tier::Ok | Tier::OkStabOverride | Tier::FaintOk) {
        Some(decision)
    } else {
        None
    }
}

/// Re-score a row against a CLAHE-enhanced view of the page instead of the
/// raw rectified grayscale, on the theory a washed-out scan suppressed the
/// true ring contrast. `enhanced` must be the same page geometry as the
/// view the row's `coords` were computed against.
pub fn near_miss_rescue(
    enhanced: &GrayImageView<'_>,
    coords: &[(f32, f32); 5],
    r: f32,
    samples: usize,
    signals: &RowSignals,
    thresholds: &omr_core::Thresholds,
    original_tier: Tier,
) -> Option<Decision> {
    if !eligible_for_rescue(original_tier) {
        return None;
    }

    let mut scores = [0.0f32; 5];
    for (i, &(x, y)) in coords.iter().enumerate() {
        scores[i] = score_bubble(enhanced, x, y, r, samples);
    }
    let stats = omr_score::row_stats(&scores);
    let rescued_signals = RowSignals {
        stats,
        ink_ratio: signals.ink_ratio,
        noise_gap: signals.noise_gap,
        median_ink: signals.median_ink,
        stability_ok: signals.stability_ok,
    };
    let decision = decide_row(&rescued_signals, thresholds, false, false);
    if matches!(decision.tier, Tier::Ok | Tier::OkStabOverride | Tier::FaintOk) {
        Some(decision)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omr_score::RowStats;

    fn thresholds() -> omr_core::Thresholds {
        omr_core::Thresholds {
            mark_th: 0.3,
            blank_th: 0.18,
            margin: 0.08,
        }
    }

    fn blank_signals() -> RowSignals {
        RowSignals {
            stats: RowStats {
                best: 0.1,
                second: 0.05,
                delta: 0.05,
                row_median: 0.07,
                row_std: 0.03,
                z: 1.0,
                best_idx: 0,
            },
            noise_gap: 1.0,
            ink_ratio: 0.1,
            median_ink: None,
            stability_ok: true,
        }
    }

    #[test]
    fn rescue_is_skipped_for_already_resolved_tiers() {
        let data = vec![240u8; 200 * 200];
        let view = GrayImageView {
            width: 200,
            height: 200,
            data: &data,
        };
        let coords = [(50.0, 50.0), (70.0, 50.0), (90.0, 50.0), (110.0, 50.0), (130.0, 50.0)];
        let out = targeted_rescue(&view, &coords, 9.0, 16, &blank_signals(), &thresholds(), Tier::Nv);
        assert!(out.is_none());
    }

    #[test]
    fn targeted_rescue_recovers_a_mark_missed_at_the_wrong_radius() {
        let w = 200;
        let h = 200;
        let mut data = vec![240u8; w * h];
        let cx = 90.0f32;
        let cy = 50.0f32;
        let r = 11.0f32;
        for y in 0..h {
            for x in 0..w {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                if (dx * dx + dy * dy).sqrt() < r {
                    data[y * w + x] = 15;
                }
            }
        }
        let view = GrayImageView {
            width: w,
            height: h,
            data: &data,
        };
        let coords = [(50.0, cy), (70.0, cy), (cx, cy), (110.0, cy), (130.0, cy)];
        // probe at a smaller nominal radius than the mark's true size
        let out = targeted_rescue(&view, &coords, 9.0, 24, &blank_signals(), &thresholds(), Tier::Blank);
        assert!(out.is_some());
        assert_eq!(out.unwrap().answer_idx, Some(2));
    }
}

//! Per-block threshold calibration (§4.6): derive `mark_th`/`blank_th`/`margin`
//! from the distribution of a block's row statistics, reusing the same Otsu
//! split preprocessing already uses for binarization.

use omr_core::Thresholds;
use omr_threshold::otsu_threshold_from_samples;

const MARK_TH_MIN: f32 = 0.03;
const MARK_TH_MAX: f32 = 0.18;
const BLANK_TH_RATIO: f32 = 0.45;
const BLANK_TH_MIN: f32 = 0.025;
const MARGIN_MIN: f32 = 0.01;
const MARGIN_MAX: f32 = 0.08;
/// Fallback margin used when fewer than 6 rows are available to take a
/// percentile from.
const MARGIN_FALLBACK: f32 = 0.018;
/// Percentile (of `row.delta` across the block) used for `margin` in the
/// normal (non-`FAINT_MODE`) case.
const MARGIN_PERCENTILE: f32 = 15.0;

const FAINT_MARK_TH: f32 = 0.03;
const FAINT_BLANK_TH: f32 = 0.02;
const FAINT_MARGIN: f32 = 0.01;

/// Minimum number of rows in a block's `delta` distribution before a
/// percentile estimate is trusted over the fixed fallback.
const MIN_ROWS_FOR_PERCENTILE: usize = 5;

/// Minimum `OK` rows required before a block is trusted not to be blank.
pub const MIN_STRONG_COUNT: usize = 5;

fn percentile(values: &[f32], p: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let rank = (p / 100.0) * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f32;
        sorted[lo] + frac * (sorted[hi] - sorted[lo])
    }
}

/// Calibrate `mark_th`/`blank_th`/`margin` for one block from its rows'
/// best-choice scores and best-minus-second deltas (§4.6).
pub fn compute_thresholds(best_scores: &[f32], deltas: &[f32], faint: bool) -> Thresholds {
    if faint {
        return Thresholds {
            mark_th: FAINT_MARK_TH,
            blank_th: FAINT_BLANK_TH,
            margin: FAINT_MARGIN,
        };
    }

    let otsu_th = if best_scores.is_empty() {
        (MARK_TH_MIN + MARK_TH_MAX) / 2.0
    } else {
        let samples: Vec<u8> = best_scores
            .iter()
            .map(|&s| (s.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        otsu_threshold_from_samples(&samples) as f32 / 255.0
    };
    let mark_th = otsu_th.clamp(MARK_TH_MIN, MARK_TH_MAX);
    let blank_th = (mark_th * BLANK_TH_RATIO).max(BLANK_TH_MIN);

    let raw_margin = if deltas.len() > MIN_ROWS_FOR_PERCENTILE {
        percentile(deltas, MARGIN_PERCENTILE)
    } else {
        MARGIN_FALLBACK
    };
    let margin = raw_margin.clamp(MARGIN_MIN, MARGIN_MAX);

    Thresholds {
        mark_th,
        blank_th,
        margin,
    }
}

/// Count rows that independently clear the `OK` bar (§4.6 `strong_count`),
/// used both by the empty-block guard and by `FAINT_OK` eligibility.
pub fn strong_count(bests: &[f32], deltas: &[f32], zs: &[f32], thresholds: &Thresholds) -> usize {
    bests
        .iter()
        .zip(deltas)
        .zip(zs)
        .filter(|((&best, &delta), &z)| best >= thresholds.mark_th && delta >= thresholds.margin && z >= 1.1)
        .count()
}

/// `true` when a non-`block1` block should be marked `EMPTY_BLOCK` in full
/// (§4.6): fewer than [`MIN_STRONG_COUNT`] confidently-OK rows.
pub fn is_empty_block(strong_count: usize, is_block1: bool) -> bool {
    !is_block1 && strong_count < MIN_STRONG_COUNT
}

/// Median ink ratio among rows eligible for the ink-calibration probe
/// (§4.6 "Ink calibration"): `best >= mark_th + 0.03` and `delta >= 2.5*margin`.
/// Requires at least 3 qualifying rows or returns `None`.
pub fn compute_median_ink(
    bests: &[f32],
    deltas: &[f32],
    ink_ratios: &[f32],
    thresholds: &Thresholds,
) -> Option<f32> {
    let mut eligible: Vec<f32> = bests
        .iter()
        .zip(deltas)
        .zip(ink_ratios)
        .filter(|((&best, &delta), _)| best >= thresholds.mark_th + 0.03 && delta >= 2.5 * thresholds.margin)
        .map(|(_, &ink)| ink)
        .collect();
    if eligible.len() < 3 {
        return None;
    }
    eligible.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = eligible.len() / 2;
    Some(if eligible.len() % 2 == 0 {
        0.5 * (eligible[mid - 1] + eligible[mid])
    } else {
        eligible[mid]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faint_mode_forces_fixed_thresholds() {
        let t = compute_thresholds(&[0.5, 0.02], &[0.3, 0.01], true);
        assert_eq!(t.mark_th, FAINT_MARK_TH);
        assert_eq!(t.blank_th, FAINT_BLANK_TH);
        assert_eq!(t.margin, FAINT_MARGIN);
    }

    #[test]
    fn blank_threshold_is_at_least_the_floor() {
        let t = compute_thresholds(&[0.01, 0.01, 0.01, 0.01], &[0.0; 4], false);
        assert!(t.blank_th >= BLANK_TH_MIN);
    }

    #[test]
    fn few_rows_use_the_fallback_margin() {
        let t = compute_thresholds(&[0.1, 0.2], &[0.02, 0.03], false);
        assert_eq!(t.margin, MARGIN_FALLBACK.clamp(MARGIN_MIN, MARGIN_MAX));
    }

    #[test]
    fn strong_count_requires_all_three_conditions() {
        let th = Thresholds {
            mark_th: 0.1,
            blank_th: 0.05,
            margin: 0.02,
        };
        let bests = [0.2, 0.05, 0.3];
        let deltas = [0.05, 0.01, 0.05];
        let zs = [1.5, 2.0, 0.5];
        assert_eq!(strong_count(&bests, &deltas, &zs, &th), 1);
    }

    #[test]
    fn empty_block_guard_exempts_block1() {
        assert!(!is_empty_block(0, true));
        assert!(is_empty_block(0, false));
        assert!(!is_empty_block(5, false));
    }

    #[test]
    fn median_ink_needs_at_least_three_samples() {
        let th = Thresholds {
            mark_th: 0.1,
            blank_th: 0.05,
            margin: 0.02,
        };
        let bests = [0.2, 0.2];
        let deltas = [0.1, 0.1];
        let inks = [0.5, 0.6];
        assert!(compute_median_ink(&bests, &deltas, &inks, &th).is_none());
    }
}

//! Per-row tiering cascade (§4.6, §9): the single-direction sequence of
//! checks that resolves one row's five choice scores to a terminal [`Tier`].
//!
//! Checks apply in this order: base tier lookup, stability check (may demote
//! to `STABILITY_FAIL` or flag an `OK_STAB_OVERRIDE`), noise veto (may demote
//! to `NV`), ink-relative check (may demote to `INK_REL_FAIL`). None of these
//! can promote a row past what the base lookup already granted.

use omr_core::{Thresholds, Tier, EPS};
use omr_score::RowStats;

/// Strong-override: a row strong enough on every axis to survive an
/// unstable `dy`-sweep vote, a noise veto, or an ink-relative rejection.
fn is_strong_override(s: &RowStats, thresholds: &Thresholds) -> bool {
    s.best >= thresholds.mark_th + 0.04 && s.delta >= 3.5 * thresholds.margin && s.z >= 2.6
}

/// Signal-strong-enough: a weaker escape hatch than [`is_strong_override`],
/// sufficient to waive the noise veto alone.
fn is_signal_strong_enough(s: &RowStats, thresholds: &Thresholds) -> bool {
    s.z >= 2.5 || s.delta >= 3.2 * thresholds.margin
}

/// Base tier from the scored row alone, first match wins (§4.6 table).
/// `faint_eligible` is `block_strong_count >= 1`, required for `FAINT_OK`.
fn base_tier(s: &RowStats, thresholds: &Thresholds, faint_mode: bool, faint_eligible: bool) -> Tier {
    if s.best >= thresholds.mark_th && s.delta >= thresholds.margin && s.z >= 1.1 {
        return Tier::Ok;
    }
    if faint_mode
        && faint_eligible
        && s.best >= thresholds.blank_th
        && s.delta >= (1.5 * thresholds.margin).max(0.02)
        && s.z >= 1.6
    {
        return Tier::FaintOk;
    }
    if s.best >= thresholds.blank_th && s.delta < thresholds.margin {
        return Tier::Multi;
    }
    if s.best >= thresholds.blank_th && s.z < 1.1 {
        return Tier::LowConf;
    }
    Tier::Blank
}

/// `true` for the two tiers the `dy`-sweep stability check and the noise
/// veto treat as "succeeding" (an answer was about to be emitted).
fn tier_is_succeeding(tier: Tier) -> bool {
    matches!(tier, Tier::Ok | Tier::FaintOk)
}

/// Majority vote over the `argmax` choice at `dy in {0, +2, -2}` (§4.6
/// "Stability check (soft)"): `true` when the same choice wins at least two
/// of the three rescored passes.
pub fn stability_check_soft(choice_at_dy: [usize; 3]) -> bool {
    let [a, b, c] = choice_at_dy;
    a == b || b == c || a == c
}

/// Everything the cascade needs beyond the five raw scores. `ink_ratio` and
/// `median_ink` (the latter computed once per block, see
/// [`crate::thresholds::compute_median_ink`]) feed the ink-relative check;
/// `stability_ok` is the result of [`stability_check_soft`] run by the
/// caller against a fresh re-score at the sibling `dy` offsets.
#[derive(Clone, Copy, Debug)]
pub struct RowSignals {
    pub stats: RowStats,
    pub noise_gap: f32,
    pub ink_ratio: f32,
    pub median_ink: Option<f32>,
    pub stability_ok: bool,
}

/// Outcome of the cascade: terminal tier, resolved answer index (if any,
/// before `STRICT`-mode nulling is applied by the caller), confidence in
/// `[0, 100]`, and an optional veto reason for `result.json`'s `vetoReason`.
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub tier: Tier,
    pub answer_idx: Option<usize>,
    pub confidence: u8,
    pub flags: Vec<String>,
    pub veto_reason: Option<String>,
}

fn confidence_from(delta: f32, best: f32) -> u8 {
    ((delta / best.max(EPS)) * 100.0).floor().clamp(0.0, 100.0) as u8
}

/// Run the full per-row cascade (§4.6) and produce its terminal [`Decision`].
pub fn decide_row(signals: &RowSignals, thresholds: &Thresholds, faint_mode: bool, faint_eligible: bool) -> Decision {
    let s = &signals.stats;
    let confidence = confidence_from(s.delta, s.best);
    let so = is_strong_override(s, thresholds);
    let ss = is_signal_strong_enough(s, thresholds);

    let mut tier = base_tier(s, thresholds, faint_mode, faint_eligible);
    let mut flags = Vec::new();

    if tier_is_succeeding(tier) && !signals.stability_ok {
        let override_eligible =
            so || (s.best >= thresholds.mark_th + 2.0 * thresholds.margin && s.delta >= 3.0 * thresholds.margin);
        if override_eligible {
            tier = Tier::OkStabOverride;
            flags.push("OK_STAB_OVERRIDE".to_string());
        } else {
            tier = Tier::StabilityFail;
        }
    }

    let still_succeeding = tier_is_succeeding(tier) || tier == Tier::OkStabOverride;
    let nv_margin = (0.25 * thresholds.margin).max(0.006);
    if still_succeeding && !so && !ss && signals.noise_gap < nv_margin {
        tier = Tier::Nv;
        return Decision {
            tier,
            answer_idx: None,
            confidence,
            flags,
            veto_reason: Some("noise_gap_below_margin".to_string()),
        };
    }

    let still_succeeding = tier_is_succeeding(tier) || tier == Tier::OkStabOverride;
    if still_succeeding && !so {
        if let Some(median_ink) = signals.median_ink {
            let floor = (0.35 * median_ink).max(0.004);
            if signals.ink_ratio < floor {
                return Decision {
                    tier: Tier::InkRelFail,
                    answer_idx: None,
                    confidence,
                    flags,
                    veto_reason: Some("ink_ratio_below_relative_floor".to_string()),
                };
            }
        }
    }

    let answer_idx = match tier {
        Tier::Ok | Tier::OkStabOverride | Tier::FaintOk | Tier::Multi | Tier::LowConf => Some(s.best_idx),
        _ => None,
    };

    Decision {
        tier,
        answer_idx,
        confidence,
        flags,
        veto_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds {
            mark_th: 0.1,
            blank_th: 0.045,
            margin: 0.02,
        }
    }

    fn stats(best: f32, second: f32, best_idx: usize, row_std: f32) -> RowStats {
        let delta = best - second;
        let row_median = (best + second) / 2.0;
        RowStats {
            best,
            second,
            delta,
            row_median,
            row_std,
            z: (best - row_median) / (row_std + 1e-6),
            best_idx,
        }
    }

    fn signals(stats: RowStats) -> RowSignals {
        RowSignals {
            stats,
            noise_gap: 1.0,
            ink_ratio: 1.0,
            median_ink: None,
            stability_ok: true,
        }
    }

    #[test]
    fn clean_strong_mark_is_ok() {
        let d = decide_row(&signals(stats(0.3, 0.01, 2, 0.05)), &thresholds(), false, false);
        assert_eq!(d.tier, Tier::Ok);
        assert_eq!(d.answer_idx, Some(2));
    }

    #[test]
    fn below_blank_threshold_is_blank() {
        let d = decide_row(&signals(stats(0.02, 0.01, 0, 0.01)), &thresholds(), false, false);
        assert_eq!(d.tier, Tier::Blank);
        assert!(d.answer_idx.is_none());
    }

    #[test]
    fn close_scores_above_blank_are_multi() {
        let d = decide_row(&signals(stats(0.08, 0.075, 1, 0.02)), &thresholds(), false, false);
        assert_eq!(d.tier, Tier::Multi);
        // MULTI still carries a best-choice index; STRICT-mode nulling is the caller's job.
        assert_eq!(d.answer_idx, Some(1));
    }

    #[test]
    fn low_z_above_blank_is_low_conf() {
        // best and second both high and close -> low z, but delta still >= margin.
        let d = decide_row(&signals(stats(0.3, 0.25, 0, 0.3)), &thresholds(), false, false);
        assert_eq!(d.tier, Tier::LowConf);
    }

    #[test]
    fn excessive_low_noise_gap_vetoes_a_weak_ok() {
        // Clears OK but is too weak to qualify as SO or SS, so the noise veto can still fire.
        let mut sig = signals(stats(0.15, 0.12, 2, 0.01));
        sig.noise_gap = 0.001;
        let d = decide_row(&sig, &thresholds(), false, false);
        assert_eq!(d.tier, Tier::Nv);
        assert!(d.veto_reason.is_some());
    }

    #[test]
    fn strong_override_survives_the_noise_veto() {
        let mut sig = signals(stats(0.9, 0.05, 3, 0.02));
        sig.noise_gap = 0.0001;
        let d = decide_row(&sig, &thresholds(), false, false);
        assert_eq!(d.tier, Tier::Ok);
    }

    #[test]
    fn unstable_dy_sweep_fails_stability_without_override() {
        // Clears OK on its own but isn't strong enough for the stability override.
        let mut sig = signals(stats(0.11, 0.08, 0, 0.01));
        sig.stability_ok = false;
        let d = decide_row(&sig, &thresholds(), false, false);
        assert_eq!(d.tier, Tier::StabilityFail);
    }

    #[test]
    fn unstable_dy_sweep_with_strong_margin_is_overridden() {
        let mut sig = signals(stats(0.9, 0.02, 4, 0.02));
        sig.stability_ok = false;
        let d = decide_row(&sig, &thresholds(), false, false);
        assert_eq!(d.tier, Tier::OkStabOverride);
        assert!(d.flags.contains(&"OK_STAB_OVERRIDE".to_string()));
    }

    #[test]
    fn faint_ok_requires_faint_mode_and_block_eligibility() {
        let th = thresholds();
        let sig = signals(stats(0.09, 0.01, 1, 0.01));

        let without_faint_mode = decide_row(&sig, &th, false, true);
        assert_eq!(without_faint_mode.tier, Tier::Blank);

        let without_eligibility = decide_row(&sig, &th, true, false);
        assert_eq!(without_eligibility.tier, Tier::Blank);

        let eligible_and_faint = decide_row(&sig, &th, true, true);
        assert_eq!(eligible_and_faint.tier, Tier::FaintOk);
        assert_eq!(eligible_and_faint.answer_idx, Some(1));
    }

    #[test]
    fn ink_relative_check_demotes_when_below_floor() {
        // Clears OK but not SO, so the ink-relative floor still applies.
        let mut sig = signals(stats(0.15, 0.12, 2, 0.01));
        sig.median_ink = Some(0.5);
        sig.ink_ratio = 0.05;
        let d = decide_row(&sig, &thresholds(), false, false);
        assert_eq!(d.tier, Tier::InkRelFail);
    }

    #[test]
    fn stability_majority_of_three() {
        assert!(stability_check_soft([1, 1, 2]));
        assert!(stability_check_soft([1, 2, 1]));
        assert!(!stability_check_soft([1, 2, 3]));
    }
}

//! Threshold calibration and the tiered decision cascade (C6) for the
//! bubble-sheet reading pipeline, plus the gated rescue passes.

mod rescue;
mod thresholds;
mod tiers;

pub use rescue::{near_miss_rescue, targeted_rescue};
pub use thresholds::{compute_median_ink, compute_thresholds, is_empty_block, strong_count, MIN_STRONG_COUNT};
pub use tiers::{decide_row, stability_check_soft, Decision, RowSignals};

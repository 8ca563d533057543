//! Bubble scoring (C5): ring-contrast and ink-ratio measurements for
//! individual choice centers, per-row statistics over those measurements,
//! and the block1 top-of-page vertical-offset correction.

pub mod dy_sweep;
pub mod sampling;
pub mod score;

pub use dy_sweep::{find_best_dy_offset, TOP_ROWS_COUNT};
pub use sampling::{disk_ink_fraction, sample_annulus_mean, sample_annulus_mean_std, sample_circle_mean};
pub use score::{compute_ink_ratio, compute_noise_at_midpoint, median, row_noise_max, row_stats, score_bubble, std_dev, RowStats};

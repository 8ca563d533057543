//! Otsu automatic threshold selection, used by the preprocessor's adaptive
//! binarization and by the decider's per-block `mark_th` computation.

mod threshold;

pub use threshold::otsu_threshold_from_samples;

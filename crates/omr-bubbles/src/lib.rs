//! Preprocessing (C2) and bubble-candidate detection / block clustering (C3)
//! for the bubble-sheet reading pipeline.

mod blocks;
mod circles;
mod preprocess;

pub use blocks::{isolate_answer_circles, split_into_blocks};
pub use circles::{detect_circles, DOWNSCALE_WIDTH};
pub use preprocess::{adaptive_threshold, clahe, otsu_global_threshold};

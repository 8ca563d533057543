//! Grid reconstruction (C4), anchor emission (C7), and the fixed-cell
//! GridReader alternative (C9) for the bubble-sheet reading pipeline.

mod anchor;
mod cluster;
mod emitter;
mod reader;

pub use anchor::build_grid_anchor;
pub use cluster::{build_grid_clustering, complete_x_centers, preferred_side, Side};
pub use emitter::{anchors_from_grids, EmittedAnchors};
pub use reader::{read_grid_answers, ColumnRange, GridReaderConfig};

//! Top-of-page drift correction (§4.5): for the first block only, probe a
//! small vertical offset before scoring its top rows, to recover from
//! scanner skew that is worst near the page's top edge.

use omr_core::GrayImageView;

use crate::score::score_bubble;

/// Rows probed for the best vertical offset at the top of block1.
pub const TOP_ROWS_COUNT: usize = 16;

/// Minimum total score (summed over the probed rows' best-choice scores)
/// required before a nonzero offset is applied.
const ACCEPT_THRESHOLD: f32 = 0.3;

/// Candidate vertical offsets, in page pixels, swept in order `-22..=22` step 4.
fn dy_candidates() -> impl Iterator<Item = i32> {
    (-22..=22).step_by(4)
}

/// For the first `TOP_ROWS_COUNT` rows of block1 (each row given as its five
/// `(x, y)` choice centers and shared radius `r`), find the vertical offset
/// `dy` that maximizes the summed best-choice [`score_bubble`] across those
/// rows, and return it if the total clears [`ACCEPT_THRESHOLD`].
///
/// `rows` may contain fewer than [`TOP_ROWS_COUNT`] entries for a short
/// block; the sweep still runs over whatever is given.
pub fn find_best_dy_offset(
    img: &GrayImageView<'_>,
    rows: &[[(f32, f32); 5]],
    r: f32,
    samples: usize,
) -> Option<i32> {
    let probe_rows = &rows[..rows.len().min(TOP_ROWS_COUNT)];
    if probe_rows.is_empty() {
        return None;
    }

    let mut best_dy = 0i32;
    let mut best_total = f32::NEG_INFINITY;

    for dy in dy_candidates() {
        let mut total = 0.0f32;
        for row in probe_rows {
            let mut row_best = 0.0f32;
            for &(x, y) in row {
                let s = score_bubble(img, x, y + dy as f32, r, samples);
                row_best = row_best.max(s);
            }
            total += row_best;
        }
        if total > best_total {
            best_total = total;
            best_dy = dy;
        }
    }

    if best_total >= ACCEPT_THRESHOLD {
        Some(best_dy)
    } else {
        None
    }
}

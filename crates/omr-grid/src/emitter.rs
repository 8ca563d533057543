//! Anchor Emitter (C7, §4.7): derive `q1A`/`q1E`/`q53A` page-space anchors
//! from the reconstructed per-block grids, for the `result.json` `anchors`
//! field and for a future invocation's `OMR_ANCHORS` override.
//!
//! Only runs when the caller did not already supply anchors — the grids it
//! reads from were themselves built by the clustering path in that case, so
//! this is purely an observational capture, not a feedback loop into
//! [`crate::anchor::build_grid_anchor`].

use omr_core::{Grid, PagePoint};

/// Spacing-consistency bound: `std(spacing) / mean(spacing) < 0.30` (§4.7).
const MAX_SPACING_CV: f32 = 0.30;

/// Anchors captured from reconstructed grids, each present only when its
/// source grid passed the spacing-consistency check.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EmittedAnchors {
    pub q1a: Option<PagePoint>,
    pub q1e: Option<PagePoint>,
    pub q53a: Option<PagePoint>,
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

fn std_dev(values: &[f32], m: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f32>() / values.len() as f32;
    var.sqrt()
}

/// `true` when consecutive-difference spacing in `values` is consistent
/// enough to trust the grid's extremes as anchors.
fn spacing_is_consistent(values: &[f32]) -> bool {
    if values.len() < 2 {
        return false;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let diffs: Vec<f32> = sorted.windows(2).map(|w| w[1] - w[0]).collect();
    let m = mean(&diffs);
    if m.abs() < 1e-6 {
        return false;
    }
    let sd = std_dev(&diffs, m);
    (sd / m.abs()) < MAX_SPACING_CV
}

/// Emit anchors from `block1`'s grid (`q1A`/`q1E`) and `block2`'s grid
/// (`q53A`), each gated on that grid's own x/y spacing consistency.
pub fn anchors_from_grids(block1: Option<&Grid>, block2: Option<&Grid>) -> EmittedAnchors {
    let mut out = EmittedAnchors::default();

    if let Some(grid) = block1 {
        let x_ok = spacing_is_consistent(&grid.x_centers);
        let y_ok = spacing_is_consistent(&grid.y_centers);
        if x_ok && y_ok {
            if let (Some(&x0), Some(&y0)) = (grid.x_centers.first(), grid.y_centers.first()) {
                out.q1a = Some(PagePoint::new(x0, y0));
            }
            if let (Some(&x4), Some(&y0)) = (grid.x_centers.last(), grid.y_centers.first()) {
                out.q1e = Some(PagePoint::new(x4, y0));
            }
        }
    }

    if let Some(grid) = block2 {
        let x_ok = spacing_is_consistent(&grid.x_centers);
        let y_ok = spacing_is_consistent(&grid.y_centers);
        if x_ok && y_ok {
            if let (Some(&x0), Some(&y0)) = (grid.x_centers.first(), grid.y_centers.first()) {
                out.q53a = Some(PagePoint::new(x0, y0));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evenly_spaced_grid(x0: f32, dx: f32, y0: f32, dy: f32, rows: usize) -> Grid {
        Grid {
            x_centers: (0..5).map(|i| x0 + i as f32 * dx).collect(),
            y_centers: (0..rows).map(|i| y0 + i as f32 * dy).collect(),
            radius: 9.0,
            anchor_used: false,
        }
    }

    #[test]
    fn emits_q1a_and_q1e_from_a_well_spaced_grid() {
        let g1 = evenly_spaced_grid(100.0, 40.0, 60.0, 28.0, 52);
        let out = anchors_from_grids(Some(&g1), None);
        assert_eq!(out.q1a, Some(PagePoint::new(100.0, 60.0)));
        assert_eq!(out.q1e, Some(PagePoint::new(260.0, 60.0)));
        assert!(out.q53a.is_none());
    }

    #[test]
    fn emits_q53a_from_second_block() {
        let g1 = evenly_spaced_grid(100.0, 40.0, 60.0, 28.0, 52);
        let g2 = evenly_spaced_grid(900.0, 40.0, 60.0, 28.0, 52);
        let out = anchors_from_grids(Some(&g1), Some(&g2));
        assert_eq!(out.q53a, Some(PagePoint::new(900.0, 60.0)));
    }

    #[test]
    fn inconsistent_spacing_suppresses_emission() {
        let mut g1 = evenly_spaced_grid(100.0, 40.0, 60.0, 28.0, 52);
        g1.x_centers = vec![100.0, 105.0, 400.0, 410.0, 900.0]; // wildly uneven
        let out = anchors_from_grids(Some(&g1), None);
        assert!(out.q1a.is_none());
        assert!(out.q1e.is_none());
    }

    #[test]
    fn no_grids_yields_no_anchors() {
        let out = anchors_from_grids(None, None);
        assert_eq!(out, EmittedAnchors::default());
    }
}

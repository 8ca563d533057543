//! Anchor-path grid reconstruction (§4.4): five choice-column centers
//! interpolated between `q1A`/`q1E`, optionally shifted per-block by the
//! `q53A` offset, with row centers taken from the densest y-cluster when it
//! covers enough rows and a linear fallback otherwise.

use omr_core::{cluster_1d, Block, Grid, PagePoint};

const CHOICES_PER_ROW: usize = 5;
const DEFAULT_RADIUS: f32 = 10.0;

fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}

/// Build a [`Grid`] for `block` from caller-supplied anchors (§4.4 "Anchor
/// path"). `q53a` supplies the per-block x-shift for every block after
/// `block1`; it is ignored for `block1` itself.
pub fn build_grid_anchor(
    block: &Block,
    q1a: PagePoint,
    q1e: PagePoint,
    q53a: Option<PagePoint>,
    rows_per_block: usize,
) -> Grid {
    let radii: Vec<f32> = block.circles.iter().map(|c| c.r).collect();
    let radius = if radii.is_empty() {
        DEFAULT_RADIUS
    } else {
        median(&radii)
    };

    let step_x = (q1e.x - q1a.x) / (CHOICES_PER_ROW - 1) as f32;
    let mut x_centers: Vec<f32> = (0..CHOICES_PER_ROW)
        .map(|i| q1a.x + i as f32 * step_x)
        .collect();

    if block.q_start > rows_per_block {
        if let Some(q53a) = q53a {
            let dx = q53a.x - q1a.x;
            for x in x_centers.iter_mut() {
                *x += dx;
            }
        }
    }

    let y_centers = if block.circles.is_empty() {
        linear_row_centers(q1a.y, q1a.y + (rows_per_block as f32 - 1.0) * 28.0, rows_per_block)
    } else {
        let ys: Vec<f32> = block.circles.iter().map(|c| c.cy).collect();
        let clusters = cluster_1d(&ys, radius.max(1.0) * 1.2);
        let min_rows = (rows_per_block as isize - 6).max(8) as usize;
        if clusters.len() >= min_rows {
            let mut means: Vec<f32> = clusters.iter().map(|c| c.mean).collect();
            means.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let nearest_idx = means
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    (**a - q1a.y).abs().partial_cmp(&(**b - q1a.y).abs()).unwrap()
                })
                .map(|(i, _)| i)
                .unwrap_or(0);
            let remaining = means.len() - nearest_idx;
            let start = if remaining >= rows_per_block {
                nearest_idx
            } else {
                means.len().saturating_sub(rows_per_block)
            };
            let mut rows: Vec<f32> = means[start..].to_vec();
            rows.truncate(rows_per_block);
            if rows.len() < rows_per_block {
                let last = *rows.last().unwrap_or(&q1a.y);
                let step = if rows.len() > 1 {
                    rows[1] - rows[0]
                } else {
                    28.0
                };
                while rows.len() < rows_per_block {
                    let next = rows.last().copied().unwrap_or(last) + step;
                    rows.push(next);
                }
            }
            rows
        } else {
            let y_max = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            linear_row_centers(q1a.y, y_max, rows_per_block)
        }
    };

    Grid {
        x_centers,
        y_centers,
        radius,
        anchor_used: true,
    }
}

fn linear_row_centers(y_top: f32, y_bottom: f32, rows: usize) -> Vec<f32> {
    let step = if rows > 1 {
        (y_bottom - y_top) / (rows - 1) as f32
    } else {
        0.0
    };
    (0..rows).map(|i| y_top + i as f32 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use omr_core::Circle;

    fn make_block(name: &str, q_start: usize, circles: Vec<Circle>) -> Block {
        let mut b = Block {
            name: name.into(),
            q_start,
            q_end: q_start + 51,
            circles,
            x_min: 0.0,
            x_max: 0.0,
            y_min: 0.0,
            y_max: 0.0,
        };
        b.recompute_bounds();
        b
    }

    #[test]
    fn block1_ignores_q53a_shift() {
        let block = make_block("block1", 1, Vec::new());
        let q1a = PagePoint::new(100.0, 50.0);
        let q1e = PagePoint::new(300.0, 50.0);
        let q53a = Some(PagePoint::new(900.0, 50.0));
        let grid = build_grid_anchor(&block, q1a, q1e, q53a, 52);
        assert!((grid.x_centers[0] - 100.0).abs() < 1e-3);
    }

    #[test]
    fn later_block_applies_q53a_shift() {
        let block = make_block("block2", 53, Vec::new());
        let q1a = PagePoint::new(100.0, 50.0);
        let q1e = PagePoint::new(300.0, 50.0);
        let q53a = Some(PagePoint::new(900.0, 50.0));
        let grid = build_grid_anchor(&block, q1a, q1e, q53a, 52);
        assert!((grid.x_centers[0] - 900.0).abs() < 1e-3);
    }

    #[test]
    fn five_columns_are_evenly_spaced() {
        let block = make_block("block1", 1, Vec::new());
        let q1a = PagePoint::new(0.0, 0.0);
        let q1e = PagePoint::new(400.0, 0.0);
        let grid = build_grid_anchor(&block, q1a, q1e, None, 10);
        assert_eq!(grid.x_centers.len(), 5);
        for w in grid.x_centers.windows(2) {
            assert!((w[1] - w[0] - 100.0).abs() < 1e-3);
        }
    }

    #[test]
    fn no_circles_falls_back_to_linear_rows() {
        let block = make_block("block1", 1, Vec::new());
        let q1a = PagePoint::new(0.0, 40.0);
        let grid = build_grid_anchor(&block, q1a, PagePoint::new(200.0, 40.0), None, 5);
        assert_eq!(grid.y_centers.len(), 5);
        assert!((grid.y_centers[0] - 40.0).abs() < 1e-3);
    }
}

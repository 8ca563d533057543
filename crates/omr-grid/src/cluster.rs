//! Clustering-path grid reconstruction (§4.4): x/y-center clustering and
//! one-dimensional column completion for blocks with fewer than five
//! detected choice columns.

use omr_core::{cluster_1d, Block, GrayImage, GrayImageView, Grid};

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

fn consecutive_diffs(sorted_values: &[f32]) -> Vec<f32> {
    sorted_values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Ring-ink ratio on the `binary` buffer (§4.5, reused by §4.4 column
/// completion): fraction of samples on the annulus `[0.95r, 1.35r]` around
/// `(cx, cy)` that are ink (`< 128`, since ink pixels are `0` and
/// background `255` in this pipeline's `binary` convention).
fn ring_ink_ratio(binary: &GrayImageView<'_>, cx: f32, cy: f32, r: f32) -> f32 {
    let samples = 16usize;
    let mut ink = 0usize;
    let mut total = 0usize;
    for &rad in &[0.95 * r, 1.15 * r, 1.35 * r] {
        for k in 0..samples {
            let t = (k as f32) * (std::f32::consts::TAU / samples as f32);
            let x = cx + rad * t.cos();
            let y = cy + rad * t.sin();
            let v = omr_core::sample_bilinear(binary, x, y);
            if v < 128.0 {
                ink += 1;
            }
            total += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        ink as f32 / total as f32
    }
}

/// Which side of the missing column to prefer when the scoring probe in
/// [`complete_x_centers`] is inconclusive, or to force a choice outright.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Complete `x_centers` (possibly fewer than [`CHOICES_PER_ROW`]) to exactly
/// five choice-column centers (§4.4 "Column completion").
pub fn complete_x_centers(
    x_centers: &[f32],
    binary: Option<&GrayImage>,
    y_centers_for_scoring: &[f32],
    radius: f32,
    page_w: f32,
    prefer: Option<Side>,
) -> Vec<f32> {
    let mut xct: Vec<f32> = x_centers.to_vec();
    xct.sort_by(|a, b| a.partial_cmp(b).unwrap());

    if xct.len() >= CHOICES_PER_ROW {
        xct.truncate(CHOICES_PER_ROW);
        return xct;
    }

    if xct.len() < 2 {
        if xct.len() == 1 {
            let sp = (30.0f32).max(radius * 2.8);
            let start = xct[0] - sp * 2.0;
            return (0..CHOICES_PER_ROW).map(|i| start + i as f32 * sp).collect();
        }
        return (0..CHOICES_PER_ROW)
            .map(|i| page_w * 0.55 + i as f32 * 30.0)
            .collect();
    }

    let diffs = consecutive_diffs(&xct);
    let sp = median(&diffs).max(radius * 2.2).max(24.0);

    if xct.len() == CHOICES_PER_ROW - 1 {
        let mut left_candidate = vec![xct[0] - sp];
        left_candidate.extend_from_slice(&xct);
        let mut right_candidate = xct.clone();
        right_candidate.push(xct[xct.len() - 1] + sp);

        if let Some(side) = prefer {
            return match side {
                Side::Left => left_candidate,
                Side::Right => right_candidate,
            };
        }

        let (Some(binary), false) = (binary, y_centers_for_scoring.is_empty()) else {
            return left_candidate;
        };
        let view = GrayImageView {
            width: binary.width,
            height: binary.height,
            data: &binary.data,
        };
        let score = |candidate: &[f32]| -> f32 {
            let ys = &y_centers_for_scoring[..y_centers_for_scoring.len().min(12)];
            let mut total = 0.0f32;
            for &y in ys {
                for &x in candidate {
                    total += ring_ink_ratio(&view, x, y, radius);
                }
            }
            total
        };
        let left_score = score(&left_candidate);
        let right_score = score(&right_candidate);
        if (left_score - right_score).abs() < 1e-3 {
            return left_candidate;
        }
        return if left_score >= right_score {
            left_candidate
        } else {
            right_candidate
        };
    }

    // Fallback: alternately grow left/right by `sp` until 5 fit in [0, page_w].
    while xct.len() < CHOICES_PER_ROW {
        let left = xct[0] - sp;
        let right = xct[xct.len() - 1] + sp;
        let left_ok = left > 0.0;
        let right_ok = right < page_w;
        if left_ok {
            xct.insert(0, left);
        }
        if xct.len() < CHOICES_PER_ROW && right_ok {
            xct.push(right);
        }
        if !left_ok && !right_ok {
            break;
        }
    }
    xct.truncate(CHOICES_PER_ROW);
    xct
}

/// `left` if the block's x-center sits left of 68% of the page width,
/// `right` otherwise (§4.4 "an image-side preference").
pub fn preferred_side(block_x_center: f32, page_w: f32) -> Side {
    if block_x_center < 0.68 * page_w {
        Side::Left
    } else {
        Side::Right
    }
}

/// Build a [`Grid`] for `block` using the clustering path (no external
/// anchors): cluster x-values for the five choice columns (completing
/// missing ones), cluster y-values for the row centers, and extrapolate the
/// topmost row when circle evidence suggests it was missed (§4.4).
pub fn build_grid_clustering(
    block: &Block,
    binary: Option<&GrayImage>,
    page_w: f32,
    rows_per_block: usize,
) -> Option<Grid> {
    if block.circles.is_empty() {
        return None;
    }
    let radii: Vec<f32> = block.circles.iter().map(|c| c.r).collect();
    let radius = if radii.is_empty() {
        DEFAULT_RADIUS
    } else {
        median(&radii)
    };

    let xs: Vec<f32> = block.circles.iter().map(|c| c.cx).collect();
    let x_clusters = cluster_1d(&xs, radius * 1.5);
    let mut by_count = x_clusters.clone();
    by_count.sort_by(|a, b| b.count.cmp(&a.count));
    let mut x_centers: Vec<f32> = by_count
        .into_iter()
        .take(CHOICES_PER_ROW)
        .map(|c| c.mean)
        .collect();
    x_centers.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let ys: Vec<f32> = block.circles.iter().map(|c| c.cy).collect();
    let y_clusters = cluster_1d(&ys, radius * 1.2);
    let y_cluster_means: Vec<f32> = y_clusters.iter().map(|c| c.mean).collect();

    if x_centers.len() < CHOICES_PER_ROW {
        let block_x_center = (block.x_min + block.x_max) / 2.0;
        let prefer = preferred_side(block_x_center, page_w);
        x_centers = complete_x_centers(
            &x_centers,
            binary,
            &y_cluster_means,
            radius,
            page_w,
            Some(prefer),
        );
    }

    let y_centers = if y_cluster_means.len() >= 2 {
        let mut sorted_y = y_cluster_means.clone();
        sorted_y.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let y_top = sorted_y[0];
        let y_bottom = *sorted_y.last().unwrap();
        let spacing = if sorted_y.len() > 5 {
            median(&consecutive_diffs(&sorted_y))
        } else if rows_per_block > 1 {
            (y_bottom - y_top) / (rows_per_block - 1) as f32
        } else {
            0.0
        };
        let extrapolation = (2.0 * spacing).clamp(30.0, 90.0);
        let y_top_extrapolated = (y_top - extrapolation).max(0.0);
        let step = if rows_per_block > 1 {
            (y_bottom - y_top_extrapolated) / (rows_per_block - 1) as f32
        } else {
            0.0
        };
        (0..rows_per_block)
            .map(|i| y_top_extrapolated + i as f32 * step)
            .collect()
    } else {
        let step = if rows_per_block > 1 {
            (block.y_max - block.y_min) / (rows_per_block - 1) as f32
        } else {
            0.0
        };
        (0..rows_per_block)
            .map(|i| block.y_min + i as f32 * step)
            .collect()
    };

    Some(Grid {
        x_centers,
        y_centers,
        radius,
        anchor_used: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use omr_core::Circle;

    fn make_block(circles: Vec<Circle>) -> Block {
        let mut b = Block {
            name: "block1".into(),
            q_start: 1,
            q_end: 52,
            circles,
            x_min: 0.0,
            x_max: 0.0,
            y_min: 0.0,
            y_max: 0.0,
        };
        b.recompute_bounds();
        b
    }

    fn full_grid_circles(rows: usize, xs: &[f32]) -> Vec<Circle> {
        let mut circles = Vec::new();
        for row in 0..rows {
            for &x in xs {
                circles.push(Circle::new(x, 40.0 + row as f32 * 28.0, 9.0));
            }
        }
        circles
    }

    #[test]
    fn complete_x_centers_left_prefers_left_when_requested() {
        let xct = [100.0, 130.0, 160.0, 190.0];
        let out = complete_x_centers(&xct, None, &[], 9.0, 1000.0, Some(Side::Left));
        assert_eq!(out.len(), 5);
        assert!(out[0] < 100.0);
    }

    #[test]
    fn complete_x_centers_right_appends_when_requested() {
        let xct = [100.0, 130.0, 160.0, 190.0];
        let out = complete_x_centers(&xct, None, &[], 9.0, 1000.0, Some(Side::Right));
        assert_eq!(out.len(), 5);
        assert!((out[0] - 100.0).abs() < 1e-3);
        assert!(out[4] > 190.0);
    }

    #[test]
    fn complete_x_centers_single_point_spans_symmetrically() {
        let out = complete_x_centers(&[150.0], None, &[], 10.0, 1000.0, None);
        assert_eq!(out.len(), 5);
        assert!(out[0] < 150.0 && out[4] > 150.0);
    }

    #[test]
    fn preferred_side_depends_on_page_fraction() {
        assert_eq!(preferred_side(100.0, 1000.0), Side::Left);
        assert_eq!(preferred_side(900.0, 1000.0), Side::Right);
    }

    #[test]
    fn build_grid_clustering_finds_five_monotonic_columns() {
        let xs = [100.0, 200.0, 300.0, 400.0, 500.0];
        let block = make_block(full_grid_circles(30, &xs));
        let grid = build_grid_clustering(&block, None, 1000.0, 30).expect("grid");
        assert_eq!(grid.x_centers.len(), 5);
        for w in grid.x_centers.windows(2) {
            assert!(w[1] > w[0]);
        }
        assert_eq!(grid.y_centers.len(), 30);
        for w in grid.y_centers.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn build_grid_clustering_completes_missing_column() {
        let xs = [100.0, 200.0, 300.0, 400.0]; // only 4 distinct columns
        let block = make_block(full_grid_circles(20, &xs));
        let grid = build_grid_clustering(&block, None, 1000.0, 20).expect("grid");
        assert_eq!(grid.x_centers.len(), 5);
    }

    #[test]
    fn empty_block_yields_no_grid() {
        let block = make_block(Vec::new());
        assert!(build_grid_clustering(&block, None, 1000.0, 52).is_none());
    }
}

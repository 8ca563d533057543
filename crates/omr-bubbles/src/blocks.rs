//! Answer-column isolation and block clustering (C3, second half, §4.3).

use omr_core::{assign_to_nearest, Block, Circle};

/// `cx > 0.52*W` primary cut for the answer-column region.
const ANSWER_X_RATIO_PRIMARY: f32 = 0.52;
/// Widened cut used when the primary cut keeps fewer than 50 circles.
const ANSWER_X_RATIO_FALLBACK: f32 = 0.45;
const MIN_ANSWER_CIRCLES_BEFORE_WIDEN: usize = 50;
/// Minimum circle count for a block-seed cluster to survive (§4.3).
const MIN_BLOCK_CIRCLES: usize = 10;

/// Keep only circles inside the answer-column region, widening the cut if
/// too few survive the primary one.
pub fn isolate_answer_circles(circles: &[Circle], page_w: f32) -> Vec<Circle> {
    if circles.is_empty() {
        return Vec::new();
    }
    let primary: Vec<Circle> = circles
        .iter()
        .copied()
        .filter(|c| c.cx > ANSWER_X_RATIO_PRIMARY * page_w)
        .collect();
    if primary.len() >= MIN_ANSWER_CIRCLES_BEFORE_WIDEN {
        return primary;
    }
    circles
        .iter()
        .copied()
        .filter(|c| c.cx > ANSWER_X_RATIO_FALLBACK * page_w)
        .collect()
}

/// Split `circles` into up to three vertical question-column blocks: seed
/// by the medians of the x-value's sorted thirds, assign each circle to its
/// nearest seed, drop undersized clusters, then re-sort left-to-right and
/// relabel `block1..blockK` with `q_start = 1 + index*rows_per_block`.
pub fn split_into_blocks(circles: &[Circle], rows_per_block: usize) -> Vec<Block> {
    if circles.len() < 30 {
        return Vec::new();
    }

    let mut xs: Vec<f32> = circles.iter().map(|c| c.cx).collect();
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = xs.len();
    let seeds = [
        median_of(&xs[0..n / 3]),
        median_of(&xs[n / 3..2 * n / 3]),
        median_of(&xs[2 * n / 3..n]),
    ];

    let assignment = assign_to_nearest(&circles.iter().map(|c| c.cx).collect::<Vec<_>>(), &seeds);
    let mut buckets: [Vec<Circle>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for (circle, &seed_idx) in circles.iter().zip(assignment.iter()) {
        buckets[seed_idx].push(*circle);
    }

    let mut blocks: Vec<Block> = buckets
        .into_iter()
        .filter(|b| b.len() >= MIN_BLOCK_CIRCLES)
        .map(|circles| {
            let mut block = Block {
                name: String::new(),
                q_start: 0,
                q_end: 0,
                circles,
                x_min: 0.0,
                x_max: 0.0,
                y_min: 0.0,
                y_max: 0.0,
            };
            block.recompute_bounds();
            block
        })
        .collect();

    blocks.sort_by(|a, b| a.mean_cx().partial_cmp(&b.mean_cx()).unwrap());
    for (i, block) in blocks.iter_mut().enumerate() {
        block.name = format!("block{}", i + 1);
        block.q_start = 1 + i * rows_per_block;
        block.q_end = (i + 1) * rows_per_block;
    }
    blocks
}

fn median_of(sorted_slice: &[f32]) -> f32 {
    if sorted_slice.is_empty() {
        return 0.0;
    }
    let mid = sorted_slice.len() / 2;
    if sorted_slice.len() % 2 == 0 && mid > 0 {
        0.5 * (sorted_slice[mid - 1] + sorted_slice[mid])
    } else {
        sorted_slice[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circles_in_column(cx: f32, n: usize) -> Vec<Circle> {
        (0..n)
            .map(|i| Circle::new(cx, i as f32 * 20.0, 8.0))
            .collect()
    }

    #[test]
    fn isolate_widens_cut_when_primary_is_too_sparse() {
        let mut circles = circles_in_column(900.0, 10);
        circles.extend(circles_in_column(400.0, 60));
        let page_w = 1000.0;
        let kept = isolate_answer_circles(&circles, page_w);
        // primary cut (>520) keeps only the 10 at cx=900; too few, so widen to >450.
        assert_eq!(kept.len(), 10);
    }

    #[test]
    fn isolate_keeps_primary_cut_when_plenty_survive() {
        let circles = circles_in_column(900.0, 60);
        let kept = isolate_answer_circles(&circles, 1000.0);
        assert_eq!(kept.len(), 60);
    }

    #[test]
    fn splits_three_well_separated_columns() {
        let mut circles = circles_in_column(100.0, 40);
        circles.extend(circles_in_column(300.0, 40));
        circles.extend(circles_in_column(500.0, 40));
        let blocks = split_into_blocks(&circles, 52);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].name, "block1");
        assert_eq!(blocks[0].q_start, 1);
        assert_eq!(blocks[1].q_start, 53);
        assert_eq!(blocks[2].q_start, 105);
        assert!(blocks[0].mean_cx() < blocks[1].mean_cx());
        assert!(blocks[1].mean_cx() < blocks[2].mean_cx());
    }

    #[test]
    fn undersized_cluster_is_dropped() {
        let mut circles = circles_in_column(100.0, 40);
        circles.extend(circles_in_column(300.0, 40));
        circles.extend(circles_in_column(500.0, 3)); // too small, discarded
        let blocks = split_into_blocks(&circles, 52);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn too_few_circles_overall_yields_no_blocks() {
        let circles = circles_in_column(100.0, 10);
        assert!(split_into_blocks(&circles, 52).is_empty());
    }
}

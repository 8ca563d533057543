//! GridReader (C9, §9): an independent fixed-percentage-cell reading path
//! that bypasses circle detection and block clustering entirely, driven
//! instead by a template-declared region of interest and per-column ranges.
//! Enabled by [`omr_core::PipelineConfig::use_grid`]; its tier vocabulary is
//! the restricted set `{OK, MULTI, BLANK, EMPTY_BLOCK}` (§9).

use omr_core::{GrayImage, GrayImageView, PagePoint, RowResult, Tier};

/// Fractional inset applied inside each cell before averaging ink, keeping
/// the sampled region clear of a neighboring cell's bleed.
const CELL_MARGIN: f32 = 0.18;
const CHOICES_PER_ROW: usize = 5;
/// Minimum confidently-answered rows for a non-first block to avoid EMPTY_BLOCK.
const MIN_ANSWERED_FOR_NON_EMPTY: usize = 5;

/// One question-column's horizontal extent within the region of interest.
#[derive(Clone, Copy, Debug)]
pub struct ColumnRange {
    pub start: f32,
    pub end: f32,
}

/// Declarative configuration for the fixed-cell reader, sourced from a
/// template's `roi`/`columnRanges` fields rather than detected circles.
#[derive(Clone, Debug)]
pub struct GridReaderConfig {
    pub roi_x: f32,
    pub roi_y: f32,
    pub roi_w: f32,
    pub roi_h: f32,
    pub column_ranges: Vec<ColumnRange>,
    pub rows_per_block: usize,
    pub expected_question_count: usize,
    pub choices: [char; CHOICES_PER_ROW],
}

impl GridReaderConfig {
    /// Evenly-spaced default column ranges spanning the ROI width, one per block.
    pub fn even_columns(roi_x: f32, roi_w: f32, blocks: usize) -> Vec<ColumnRange> {
        let width = roi_w / blocks.max(1) as f32;
        (0..blocks)
            .map(|i| ColumnRange {
                start: roi_x + i as f32 * width,
                end: roi_x + (i as f32 + 1.0) * width,
            })
            .collect()
    }
}

struct CellSample {
    question: usize,
    block: String,
    ratios: [f32; CHOICES_PER_ROW],
    coords: [(f32, f32); CHOICES_PER_ROW],
}

fn cell_ink_ratio(binary: &GrayImageView<'_>, cx: f32, cy: f32, cell_w: f32, cell_h: f32) -> f32 {
    let hw = cell_w * (0.5 - CELL_MARGIN);
    let hh = cell_h * (0.5 - CELL_MARGIN);
    let x0 = (cx - hw).max(0.0).floor() as i32;
    let x1 = (cx + hw).min(binary.width as f32 - 1.0).ceil() as i32;
    let y0 = (cy - hh).max(0.0).floor() as i32;
    let y1 = (cy + hh).min(binary.height as f32 - 1.0).ceil() as i32;
    let mut ink = 0u32;
    let mut total = 0u32;
    for y in y0..=y1 {
        for x in x0..=x1 {
            if x < 0 || y < 0 || x >= binary.width as i32 || y >= binary.height as i32 {
                continue;
            }
            if binary.data[y as usize * binary.width + x as usize] < 128 {
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

fn sample_cells(binary: &GrayImage, cfg: &GridReaderConfig) -> Vec<CellSample> {
    let view = GrayImageView {
        width: binary.width,
        height: binary.height,
        data: &binary.data,
    };
    let row_h = cfg.roi_h / cfg.rows_per_block as f32;
    let mut samples = Vec::new();
    let mut question = 1usize;

    for (block_idx, range) in cfg.column_ranges.iter().enumerate() {
        let col_w = (range.end - range.start) / CHOICES_PER_ROW as f32;
        for row in 0..cfg.rows_per_block {
            if question > cfg.expected_question_count {
                break;
            }
            let cy = cfg.roi_y + (row as f32 + 0.5) * row_h;
            let mut ratios = [0.0f32; CHOICES_PER_ROW];
            let mut coords = [(0.0f32, 0.0f32); CHOICES_PER_ROW];
            for choice in 0..CHOICES_PER_ROW {
                let cx = range.start + (choice as f32 + 0.5) * col_w;
                ratios[choice] = cell_ink_ratio(&view, cx, cy, col_w, row_h);
                coords[choice] = (cx, cy);
            }
            samples.push(CellSample {
                question,
                block: format!("block{}", block_idx + 1),
                ratios,
                coords,
            });
            question += 1;
        }
    }
    samples
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
    (values.iter().map(|v| (v - m) * (v - m)).sum::<f32>() / values.len() as f32).sqrt()
}

/// Dynamic mark/blank thresholds derived from the bottom 30% (at least 5) of
/// all sampled ink ratios, used as a stand-in for a per-page baseline reading
/// taken off the `gray_clahe` buffer.
struct DynamicThresholds {
    mark_th: f32,
    delta_th: f32,
}

fn compute_dynamic_thresholds(samples: &[CellSample]) -> DynamicThresholds {
    let mut all_ratios: Vec<f32> = samples.iter().flat_map(|s| s.ratios).collect();
    all_ratios.sort_by(|a, b| a.partial_cmp(b).unwrap());
    if all_ratios.is_empty() {
        return DynamicThresholds {
            mark_th: 0.35,
            delta_th: 0.05,
        };
    }
    let baseline_n = ((all_ratios.len() as f32 * 0.3) as usize).max(5).min(all_ratios.len());
    let baseline = &all_ratios[..baseline_n];
    let baseline_avg = mean(baseline);
    let baseline_std = std_dev(baseline, baseline_avg);

    DynamicThresholds {
        mark_th: (0.35f32).max(baseline_avg + (0.05f32).max(2.0 * baseline_std)),
        delta_th: (0.05f32).max(baseline_std * 2.0),
    }
}

/// Run the fixed-cell reader end to end, returning one [`RowResult`] per
/// question up to `expected_question_count` and the `q1A`/`q1E`/`q53A`
/// anchors implied by the configured cell coordinates.
pub fn read_grid_answers(
    binary: &GrayImage,
    cfg: &GridReaderConfig,
) -> (Vec<RowResult>, (Option<PagePoint>, Option<PagePoint>, Option<PagePoint>)) {
    let samples = sample_cells(binary, cfg);
    if samples.is_empty() {
        return (Vec::new(), (None, None, None));
    }
    let thresholds = compute_dynamic_thresholds(&samples);

    let mut rows = Vec::with_capacity(samples.len());
    let mut block_answered: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for sample in &samples {
        let row_avg = mean(&sample.ratios);
        let row_std = std_dev(&sample.ratios, row_avg);
        let row_gate = thresholds.mark_th.max(row_avg + thresholds.delta_th.max(row_std));

        let mut idx: Vec<usize> = (0..CHOICES_PER_ROW).collect();
        idx.sort_by(|&a, &b| sample.ratios[b].partial_cmp(&sample.ratios[a]).unwrap());
        let best = sample.ratios[idx[0]];
        let second = sample.ratios[idx[1]];
        let gap = best - second;

        let is_blank = best < row_gate;
        let selection_gate = row_gate.max(row_avg + thresholds.delta_th.max(row_std * 1.1));
        let selected: Vec<usize> = (0..CHOICES_PER_ROW)
            .filter(|&i| sample.ratios[i] >= selection_gate)
            .collect();

        let (tier, answer, best_idx) = if is_blank {
            (Tier::Blank, None, None)
        } else if selected.len() > 1 || gap < thresholds.delta_th.max(row_std) {
            (Tier::Multi, None, Some(idx[0]))
        } else {
            (Tier::Ok, Some(cfg.choices[idx[0]]), Some(idx[0]))
        };

        if answer.is_some() {
            *block_answered.entry(sample.block.clone()).or_insert(0) += 1;
        }

        let confidence = if best.max(second) > 0.0 {
            (((best - second) / best.max(1e-6)) * 100.0).clamp(0.0, 100.0) as u8
        } else {
            0
        };

        rows.push(RowResult {
            question: sample.question,
            block: sample.block.clone(),
            scores: sample.ratios,
            coords: sample.coords,
            best,
            second,
            delta: gap,
            row_median: row_avg,
            row_std,
            z: (best - row_avg) / (row_std + omr_core::EPS),
            noise_max: 0.0,
            noise_gap: gap,
            ink_ratio: best,
            best_idx,
            answer,
            confidence,
            tier,
            flags: Vec::new(),
            veto_reason: None,
            tags: vec!["grid_reader".to_string()],
        });
    }

    for row in rows.iter_mut() {
        let is_first_block = row.block == "block1";
        if !is_first_block {
            let answered = block_answered.get(&row.block).copied().unwrap_or(0);
            if answered < MIN_ANSWERED_FOR_NON_EMPTY {
                row.tier = Tier::EmptyBlock;
                row.answer = None;
            }
        }
    }

    let q1 = rows.iter().find(|r| r.question == 1);
    let q53 = rows.iter().find(|r| r.question == 53);
    let q1a = q1.map(|r| PagePoint::new(r.coords[0].0, r.coords[0].1));
    let q1e = q1.map(|r| PagePoint::new(r.coords[4].0, r.coords[4].1));
    let q53a = q53.map(|r| PagePoint::new(r.coords[0].0, r.coords[0].1));

    (rows, (q1a, q1e, q53a))
}

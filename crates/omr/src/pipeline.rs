//! End-to-end orchestration (§2, §6): wires C1-C7 together over one
//! already-decoded grayscale page. Buffer-in, buffer-out — no file I/O, no
//! image decode, matching the spec's collaborator boundary (§1). The
//! `OMR_USE_GRID` alternative (C9) is an independent code path that
//! converges only at `RowResult` (§9).

use std::collections::BTreeMap;

use log::warn;

use omr_core::{Grid, GrayImage, GrayImageView, PipelineConfig, RecoverableError, RowResult, Tier};
use omr_decide::{
    compute_median_ink, compute_thresholds, decide_row, is_empty_block, stability_check_soft, strong_count,
    RowSignals,
};
use omr_grid::{anchors_from_grids, build_grid_anchor, build_grid_clustering, read_grid_answers, GridReaderConfig};
use omr_score::{compute_ink_ratio, find_best_dy_offset, row_noise_max, row_stats, score_bubble, TOP_ROWS_COUNT};

use crate::result::{AnswerRow, Anchors, Meta, PipelineResult, Summary};
use crate::template::Template;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Angular sample count passed to every ring/annulus probe this facade runs.
/// The component crates take it as a parameter; this is the one place a
/// caller retuning sampling density for an unusually small/large bubble
/// template would change it.
const RING_SAMPLES: usize = 24;

/// Minimum answer-column circle count below which detection is reported as
/// `too_few_circles` rather than `no_circles` (§7).
const MIN_CIRCLES_FOR_TOO_FEW: usize = 1;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn view(img: &GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width,
        height: img.height,
        data: &img.data,
    }
}

/// Result of [`run_pipeline`]: the `result.json` document plus the
/// rectified page, which a file-system-facing caller writes out as
/// `warped.png` (§6).
pub struct PipelineOutcome {
    pub result: PipelineResult,
    pub warped: GrayImage,
}

/// Run the full reading pipeline over one image already decoded to a
/// grayscale buffer. This is the pipeline's real contract (§1-§5); file
/// I/O, image decoding, and the preview overlay are external collaborators
/// whose only contract with this crate is the `result.json`/`warped.png`
/// shape (§6).
#[cfg_attr(feature = "tracing", instrument(level = "info", skip(input, template, config)))]
pub fn run_pipeline(input: &GrayImageView<'_>, template: &Template, config: &PipelineConfig) -> PipelineOutcome {
    let mut warnings: Vec<String> = Vec::new();
    let choices = template.choice_chars();
    let page_w = template.page.width as usize;
    let page_h = template.page.height as usize;

    let rectified = omr_rectify::rectify(input, config.overrides.corners, page_w, page_h);
    for w in &rectified.warnings {
        warnings.push(w.to_string());
    }
    if !rectified.corners_found {
        warnings.push(RecoverableError::CornersMissing.to_string());
    }
    let gray = rectified.image;

    let result = if config.use_grid {
        run_grid_reader(&gray, template, config, rectified.corners_found, warnings)
    } else {
        run_circle_model(&gray, template, config, rectified.corners_found, warnings, &choices)
    };

    PipelineOutcome { result, warped: gray }
}

/// The GridReader alternative (C9, §9): a fixed-percentage-cell reader
/// driven entirely by the template's ROI/column ranges, bypassing circle
/// detection and block clustering.
fn run_grid_reader(
    gray: &GrayImage,
    template: &Template,
    config: &PipelineConfig,
    corners_found: bool,
    warnings: Vec<String>,
) -> PipelineResult {
    let binary = omr_bubbles::adaptive_threshold(gray);
    let (roi_x, roi_y, roi_w, roi_h) = template
        .grid_roi_px()
        .unwrap_or((0.0, 0.0, gray.width as f32, gray.height as f32));
    let column_ranges = template.grid_column_ranges();
    let blocks_detected = column_ranges.len();
    let reader_cfg = GridReaderConfig {
        roi_x,
        roi_y,
        roi_w,
        roi_h,
        column_ranges,
        rows_per_block: template.rows_per_block,
        expected_question_count: template.expected_question_count,
        choices: template.choice_chars(),
    };

    let (rows, (q1a, q1e, q53a)) = read_grid_answers(&binary, &reader_cfg);
    let mut rows_by_question = BTreeMap::new();
    for row in rows {
        rows_by_question.insert(row.question, row);
    }

    let anchors = Anchors {
        q1a: q1a.map(|p| [p.x, p.y]),
        q1e: q1e.map(|p| [p.x, p.y]),
        q53a: q53a.map(|p| [p.x, p.y]),
    };

    finalize(
        rows_by_question,
        template,
        config,
        &template.choice_chars(),
        corners_found,
        0,
        blocks_detected,
        warnings,
        anchors,
    )
}

/// The primary circle-detection model (C3-C7).
fn run_circle_model(
    gray: &GrayImage,
    template: &Template,
    config: &PipelineConfig,
    corners_found: bool,
    mut warnings: Vec<String>,
    choices: &[char; 5],
) -> PipelineResult {
    let binary = omr_bubbles::adaptive_threshold(gray);
    let gray_clahe = if config.rescue_passes {
        Some(omr_bubbles::clahe(gray))
    } else {
        None
    };
    let gray_view = view(gray);

    let circles_all = omr_bubbles::detect_circles(gray);
    let circles = omr_bubbles::isolate_answer_circles(&circles_all, template.page.width as f32);
    let blocks = omr_bubbles::split_into_blocks(&circles, template.rows_per_block);

    if blocks.is_empty() {
        let err = if circles.len() < MIN_CIRCLES_FOR_TOO_FEW {
            RecoverableError::NoCircles
        } else {
            RecoverableError::TooFewCircles {
                found: circles.len(),
                min_required: 30,
            }
        };
        warn!("{err}");
        warnings.push(err.to_string());
        return finalize(
            BTreeMap::new(),
            template,
            config,
            choices,
            corners_found,
            circles.len(),
            0,
            warnings,
            Anchors::default(),
        );
    }

    let has_anchor_overrides = config.overrides.q1a.is_some() && config.overrides.q1e.is_some();

    let grids: Vec<Option<Grid>> = blocks
        .iter()
        .map(|block| {
            if has_anchor_overrides {
                let q1a = config.overrides.q1a.unwrap();
                let q1e = config.overrides.q1e.unwrap();
                Some(build_grid_anchor(block, q1a, q1e, config.overrides.q53a, template.rows_per_block))
            } else {
                build_grid_clustering(block, Some(&binary), template.page.width as f32, template.rows_per_block)
            }
        })
        .collect();

    let anchors = if has_anchor_overrides {
        Anchors {
            q1a: config.overrides.q1a.map(|p| [p.x, p.y]),
            q1e: config.overrides.q1e.map(|p| [p.x, p.y]),
            q53a: config.overrides.q53a.map(|p| [p.x, p.y]),
        }
    } else {
        let emitted = anchors_from_grids(grids.first().and_then(Option::as_ref), grids.get(1).and_then(Option::as_ref));
        Anchors {
            q1a: emitted.q1a.map(|p| [p.x, p.y]),
            q1e: emitted.q1e.map(|p| [p.x, p.y]),
            q53a: emitted.q53a.map(|p| [p.x, p.y]),
        }
    };

    let mut rows_by_question: BTreeMap<usize, RowResult> = BTreeMap::new();

    for (bi, block) in blocks.iter().enumerate() {
        let grid = match grids[bi].as_ref() {
            Some(g) => g,
            None => {
                for q in block.q_start..=block.q_end {
                    rows_by_question.insert(q, RowResult::not_detected(q));
                }
                continue;
            }
        };
        let is_block1 = bi == 0;

        if config.preview_only {
            for q in block.q_start..=block.q_end {
                rows_by_question.insert(q, RowResult::not_detected(q));
            }
            continue;
        }

        score_and_decide_block(
            block,
            grid,
            is_block1,
            &gray_view,
            gray_clahe.as_ref(),
            config,
            &mut rows_by_question,
            &mut warnings,
            choices,
        );
    }

    finalize(
        rows_by_question,
        template,
        config,
        choices,
        corners_found,
        circles.len(),
        blocks.len(),
        warnings,
        anchors,
    )
}

/// Score and decide every row of one block (C5-C6), inserting the resolved
/// [`RowResult`]s into `rows_by_question`.
#[allow(clippy::too_many_arguments)]
fn score_and_decide_block(
    block: &omr_core::Block,
    grid: &Grid,
    is_block1: bool,
    gray_view: &GrayImageView<'_>,
    gray_clahe: Option<&GrayImage>,
    config: &PipelineConfig,
    rows_by_question: &mut BTreeMap<usize, RowResult>,
    warnings: &mut Vec<String>,
    choices: &[char; 5],
) {
    let dy = if is_block1 {
        let n_probe = grid.y_centers.len().min(TOP_ROWS_COUNT);
        let probe_rows: Vec<[(f32, f32); 5]> = grid.y_centers[..n_probe]
            .iter()
            .map(|&y| {
                let mut coords = [(0.0f32, 0.0f32); 5];
                for (i, c) in coords.iter_mut().enumerate() {
                    *c = (grid.x_centers[i], y);
                }
                coords
            })
            .collect();
        find_best_dy_offset(gray_view, &probe_rows, grid.radius, RING_SAMPLES).unwrap_or(0)
    } else {
        0
    };

    struct Scored {
        question: usize,
        coords: [(f32, f32); 5],
        scores: [f32; 5],
        stats: omr_score::RowStats,
        noise_max: f32,
        ink_ratio: f32,
    }

    let mut scored = Vec::with_capacity(grid.y_centers.len());
    for (ri, &y_center) in grid.y_centers.iter().enumerate() {
        let question = block.q_start + ri;
        let y = if is_block1 && ri < TOP_ROWS_COUNT {
            y_center + dy as f32
        } else {
            y_center
        };
        let mut coords = [(0.0f32, 0.0f32); 5];
        let mut scores = [0.0f32; 5];
        for i in 0..5 {
            let x = grid.x_centers[i];
            coords[i] = (x, y);
            scores[i] = score_bubble(gray_view, x, y, grid.radius, RING_SAMPLES);
        }
        let stats = row_stats(&scores);
        let noise_max = row_noise_max(gray_view, &coords, grid.radius, RING_SAMPLES);
        let (bx, by) = coords[stats.best_idx];
        let ink_ratio = compute_ink_ratio(gray_view, bx, by, grid.radius, RING_SAMPLES);
        scored.push(Scored {
            question,
            coords,
            scores,
            stats,
            noise_max,
            ink_ratio,
        });
    }

    let bests: Vec<f32> = scored.iter().map(|s| s.stats.best).collect();
    let deltas: Vec<f32> = scored.iter().map(|s| s.stats.delta).collect();
    let zs: Vec<f32> = scored.iter().map(|s| s.stats.z).collect();
    let ink_ratios: Vec<f32> = scored.iter().map(|s| s.ink_ratio).collect();

    let thresholds = compute_thresholds(&bests, &deltas, config.faint);
    let sc = strong_count(&bests, &deltas, &zs, &thresholds);
    let median_ink = compute_median_ink(&bests, &deltas, &ink_ratios, &thresholds);
    let empty_block = is_empty_block(sc, is_block1);
    if empty_block {
        let err = RecoverableError::BlockEmpty {
            name: block.name.clone(),
        };
        warn!("{err}");
        warnings.push(err.to_string());
    }
    let faint_eligible = sc >= 1;

    for s in scored {
        if empty_block {
            let mut row = RowResult::not_detected(s.question);
            row.block = block.name.clone();
            row.scores = s.scores;
            row.coords = s.coords;
            row.best = s.stats.best;
            row.second = s.stats.second;
            row.delta = s.stats.delta;
            row.row_median = s.stats.row_median;
            row.row_std = s.stats.row_std;
            row.z = s.stats.z;
            row.noise_max = s.noise_max;
            row.noise_gap = s.stats.best - s.noise_max;
            row.ink_ratio = s.ink_ratio;
            row.best_idx = Some(s.stats.best_idx);
            row.tier = Tier::EmptyBlock;
            row.flags = vec!["EMPTY_BLOCK".to_string()];
            rows_by_question.insert(s.question, row);
            continue;
        }

        let rescore_at = |dy: f32| -> usize {
            let mut alt_scores = [0.0f32; 5];
            for i in 0..5 {
                let (x, y) = s.coords[i];
                alt_scores[i] = score_bubble(gray_view, x, y + dy, grid.radius, RING_SAMPLES);
            }
            row_stats(&alt_scores).best_idx
        };
        let stability_ok = stability_check_soft([s.stats.best_idx, rescore_at(2.0), rescore_at(-2.0)]);

        let signals = RowSignals {
            stats: s.stats,
            noise_gap: s.stats.best - s.noise_max,
            ink_ratio: s.ink_ratio,
            median_ink,
            stability_ok,
        };
        let mut decision = decide_row(&signals, &thresholds, config.faint, faint_eligible);

        if config.rescue_passes {
            if let Some(rescued) = omr_decide::targeted_rescue(
                gray_view,
                &s.coords,
                grid.radius,
                RING_SAMPLES,
                &signals,
                &thresholds,
                decision.tier,
            ) {
                decision = rescued;
            } else if let Some(clahe_img) = gray_clahe {
                let clahe_view = view(clahe_img);
                if let Some(rescued) = omr_decide::near_miss_rescue(
                    &clahe_view,
                    &s.coords,
                    grid.radius,
                    RING_SAMPLES,
                    &signals,
                    &thresholds,
                    decision.tier,
                ) {
                    decision = rescued;
                }
            }
        }

        let row = RowResult {
            question: s.question,
            block: block.name.clone(),
            scores: s.scores,
            coords: s.coords,
            best: s.stats.best,
            second: s.stats.second,
            delta: s.stats.delta,
            row_median: s.stats.row_median,
            row_std: s.stats.row_std,
            z: s.stats.z,
            noise_max: s.noise_max,
            noise_gap: s.stats.best - s.noise_max,
            ink_ratio: s.ink_ratio,
            best_idx: decision.answer_idx,
            answer: decision.answer_idx.map(|i| choices[i]),
            confidence: decision.confidence,
            tier: decision.tier,
            flags: decision.flags,
            veto_reason: decision.veto_reason,
            tags: Vec::new(),
        };
        rows_by_question.insert(s.question, row);
    }
}

/// Assemble the final `result.json` document from a (possibly partial) map
/// of decided rows: fills every question in `[1, upper]` that no block
/// reached with a `NOT_DETECTED` placeholder (§3 invariant 1), applies
/// `OMR_LIMIT_FIRST_BLOCK`/`OMR_MAX_QUESTIONS`, and converts to the wire
/// `AnswerRow` shape with STRICT-mode nulling.
#[allow(clippy::too_many_arguments)]
fn finalize(
    rows_by_question: BTreeMap<usize, RowResult>,
    template: &Template,
    config: &PipelineConfig,
    choices: &[char; 5],
    corners_found: bool,
    total_circles: usize,
    blocks_detected: usize,
    warnings: Vec<String>,
    anchors: Anchors,
) -> PipelineResult {
    let upper = if config.limit_first_block {
        template.rows_per_block
    } else {
        template.expected_question_count
    };

    let mut answers: Vec<AnswerRow> = (1..=upper)
        .map(|q| {
            let row = rows_by_question
                .get(&q)
                .cloned()
                .unwrap_or_else(|| RowResult::not_detected(q));
            AnswerRow::from_row_result(&row, choices, config.strict)
        })
        .collect();

    if let Some(max_q) = config.max_questions {
        answers.truncate(max_q);
    }

    let summary = Summary::compute(&answers);
    let meta = Meta {
        template_key: template.key.clone(),
        expected_question_count: template.expected_question_count,
        page_size: [template.page.width, template.page.height],
        strict_mode: config.strict,
        version: VERSION.to_string(),
        corner_markers_found: corners_found,
        total_circles,
        blocks_detected,
        warnings,
    };

    PipelineResult {
        template_key: template.key.clone(),
        answers,
        summary,
        meta,
        anchors,
    }
}

//! Sweep reduction: evaluate every simulated grid point and emit the
//! distribution and aggregated-curves tables.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::aggregate;
use crate::align::{self, AlignmentParams, AlignmentResult};
use crate::config::PipelineConfig;
use crate::grid::ParameterPoint;
use crate::ground_truth::GroundTruthSeries;
use crate::output;
use crate::registry::PopulationRegistry;
use crate::table::RawSimulationTable;

/// One row of the loss-distribution table. Column names match what the
/// dashboard reads.
#[derive(Debug, Serialize)]
pub struct DistributionRow {
    pub point: usize,
    #[serde(rename = "R0")]
    pub r0: f64,
    #[serde(rename = "R1")]
    pub r1: f64,
    #[serde(rename = "R1_shift")]
    pub r1_shift: i64,
    pub loss: f64,
    pub equal_ratio: f64,
    pub shift: usize,
}

/// Result of a full sweep collection.
#[derive(Debug)]
pub struct SweepSummary {
    /// Globally minimal-loss point, if any point was evaluated.
    pub best: Option<(ParameterPoint, AlignmentResult)>,
    /// Points that produced a distribution row.
    pub evaluated: usize,
    /// Unparsable file names, unreadable tables, aggregation errors.
    pub failed: usize,
    /// Degenerate alignments (zero-sum curve or no in-range shift).
    pub excluded: usize,
}

struct EvaluatedPoint {
    point: ParameterPoint,
    result: AlignmentResult,
    /// National curve multiplied by the best-fit scale.
    scaled_national: Vec<f64>,
}

/// Raw-output files with a parseable point label, sorted by parameter tuple
/// so evaluation and artifact order never depend on directory order.
fn scan_raw_outputs(dir: &Path, failed: &mut usize) -> Result<Vec<(ParameterPoint, PathBuf)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("reading raw output directory {}", dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            error!(file = ?name, "raw output file name is not valid UTF-8");
            *failed += 1;
            continue;
        };
        match ParameterPoint::parse_label(name) {
            Ok(point) => files.push((point, entry.path())),
            Err(e) => {
                error!(file = name, error = %e, "rejecting raw output file");
                *failed += 1;
            }
        }
    }
    files.sort_by(|(a, _), (b, _)| a.cmp_params(b));
    Ok(files)
}

/// Evaluates every raw output table in the run directory and writes the
/// artifacts under `<output_root>/helper/`.
///
/// Per-point failures are logged and counted; only a missing raw-output
/// directory aborts.
#[tracing::instrument(skip_all, fields(sim_id = %config.sim_id))]
pub fn collect_sweep(
    config: &PipelineConfig,
    registry: &PopulationRegistry,
    ground_truth: &GroundTruthSeries,
) -> Result<SweepSummary> {
    let dir = config.sim_output_dir();
    if !dir.is_dir() {
        bail!(
            "raw output directory {} not found; run with --sim first",
            dir.display()
        );
    }
    let params = AlignmentParams {
        anchor_day: config.anchor_day,
        shift_window: config.shift_window,
        global_rate: config.loss.global_rate,
    };

    let mut failed = 0;
    let mut excluded = 0;
    let files = scan_raw_outputs(&dir, &mut failed)?;
    info!(points = files.len(), "evaluating simulated grid points");

    let mut evaluated: Vec<EvaluatedPoint> = Vec::new();
    let mut expected_days: Option<usize> = None;
    let mut best_index: Option<usize> = None;
    let mut best_ages: Vec<Vec<f64>> = Vec::new();

    for (point, path) in files {
        let label = point.label();

        let table = match RawSimulationTable::from_path(&path) {
            Ok(table) => table,
            Err(e) => {
                error!(label = %label, error = %e, "failed to load raw table");
                failed += 1;
                continue;
            }
        };
        match expected_days {
            None => expected_days = Some(table.days()),
            Some(days) if days != table.days() => {
                error!(
                    label = %label,
                    days = table.days(),
                    expected = days,
                    "raw table day count differs from the rest of the sweep"
                );
                failed += 1;
                continue;
            }
            Some(_) => {}
        }

        let curves = match aggregate::aggregate(
            &table,
            registry,
            config.age_groups,
            &config.death_rate,
        ) {
            Ok(curves) => curves,
            Err(e) => {
                error!(label = %label, error = %e, "aggregation failed");
                failed += 1;
                continue;
            }
        };

        let Some(result) = align::best_alignment(&curves, ground_truth, &params) else {
            warn!(label = %label, "no valid alignment, excluding point");
            excluded += 1;
            continue;
        };

        let scaled_national = curves.national.iter().map(|v| v * result.scale).collect();
        if best_index.is_none_or(|i| result.loss < evaluated[i].result.loss) {
            best_index = Some(evaluated.len());
            best_ages = curves.ages;
        }
        evaluated.push(EvaluatedPoint { point, result, scaled_national });
    }

    let best = best_index.map(|i| (evaluated[i].point, evaluated[i].result));

    if evaluated.is_empty() {
        warn!(failed, excluded, "no grid point could be evaluated, skipping artifacts");
        return Ok(SweepSummary { best: None, evaluated: 0, failed, excluded });
    }
    let (best_point, best_result) = best.unwrap();

    let rows: Vec<DistributionRow> = evaluated
        .iter()
        .enumerate()
        .map(|(i, e)| DistributionRow {
            point: i,
            r0: e.point.r0,
            r1: e.point.r1,
            r1_shift: e.point.shift,
            loss: e.result.loss,
            equal_ratio: e.result.scale,
            shift: e.result.shift_days,
        })
        .collect();
    let helper = config.helper_dir();
    output::write_rows(&helper.join(format!("{}_distribution.csv", config.sim_id)), &rows)?;

    // ground truth anchored at the overall best shift; the window was valid
    // during alignment, so it is valid here
    let days = expected_days.unwrap_or(0);
    let gt_column = ground_truth
        .window(config.anchor_day - best_result.shift_days, days)
        .map(|w| w.national().to_vec())
        .unwrap_or_default();

    let mut columns = vec![("Ground truth".to_string(), gt_column)];
    columns.extend(
        evaluated
            .iter()
            .map(|e| (e.point.column_key(), e.scaled_national.clone())),
    );
    output::write_curve_table(&helper.join(format!("{}_agg.csv", config.sim_id)), &columns)?;

    let age_columns: Vec<(String, Vec<f64>)> = best_ages
        .into_iter()
        .enumerate()
        .map(|(age, curve)| (age.to_string(), curve))
        .collect();
    output::write_curve_table(&helper.join(format!("{}_ages.csv", config.sim_id)), &age_columns)?;

    info!(
        best = %best_point.label(),
        loss = best_result.loss,
        equal_ratio = best_result.scale,
        shift = best_result.shift_days,
        evaluated = evaluated.len(),
        failed,
        excluded,
        "sweep collection finished"
    );

    Ok(SweepSummary { best, evaluated: evaluated.len(), failed, excluded })
}

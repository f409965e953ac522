//! Temporal alignment of a simulated aggregate against ground truth.
//!
//! A brute-force scan over a bounded window of integer day shifts. The loss
//! surface is not guaranteed smooth, so this deliberately stays a discrete
//! search rather than a continuous optimizer.

use tracing::{debug, warn};

use crate::aggregate::AggregatedCurves;
use crate::ground_truth::GroundTruthSeries;
use crate::util::{mae, mean};

/// Best-fit temporal offset and magnitude scale for one grid point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentResult {
    pub loss: f64,
    /// Multiplicative factor aligning simulated magnitude to ground truth.
    pub scale: f64,
    /// Day offset back from the anchor day.
    pub shift_days: usize,
}

/// Search settings, taken from the pipeline configuration.
#[derive(Debug, Clone, Copy)]
pub struct AlignmentParams {
    /// Ground-truth day the zero shift aligns the simulation start to.
    pub anchor_day: usize,
    /// Candidate shifts scanned: `0..shift_window`.
    pub shift_window: usize,
    /// Weight of the national loss term, in `[0, 1]`.
    pub global_rate: f64,
}

/// Finds the shift minimizing the composite loss, ties broken by the
/// smallest shift.
///
/// Returns `None` when the point is degenerate: the simulated national curve
/// sums to zero (the scale would be undefined at every shift), or no
/// candidate shift yields an in-range ground-truth window.
pub fn best_alignment(
    curves: &AggregatedCurves,
    ground_truth: &GroundTruthSeries,
    params: &AlignmentParams,
) -> Option<AlignmentResult> {
    let days = curves.national.len();
    let sim_total: f64 = curves.national.iter().sum();
    if sim_total == 0.0 {
        warn!("simulated national curve sums to zero, no scale exists");
        return None;
    }

    // Counties without ground-truth coverage are excluded from the county
    // term, not scored as zero-error.
    let matched: Vec<&(String, Vec<f64>)> = curves
        .counties
        .iter()
        .filter(|(name, _)| {
            let covered = ground_truth.has_county(name);
            if !covered {
                debug!(county = %name, "no ground-truth coverage, excluded from county loss");
            }
            covered
        })
        .collect();

    let mut best: Option<AlignmentResult> = None;
    for shift in 0..params.shift_window {
        let Some(start) = params.anchor_day.checked_sub(shift) else {
            continue;
        };
        let Some(window) = ground_truth.window(start, days) else {
            continue;
        };

        let scale = window.national_sum() / sim_total;

        let county_losses: Vec<f64> = matched
            .iter()
            .map(|(name, curve)| {
                // matched counties always resolve inside the window
                let observed = window.county(name).unwrap();
                mae(observed, curve, scale)
            })
            .collect();
        let county_loss = mean(&county_losses);
        let global_loss = mae(window.national(), &curves.national, scale);

        let r = params.global_rate;
        let loss = (1.0 - r) * county_loss + r * global_loss;

        // strict < on an ascending scan keeps the smallest tied shift
        if best.is_none_or(|b| loss < b.loss) {
            best = Some(AlignmentResult { loss, scale, shift_days: shift });
        }
    }

    if best.is_none() {
        warn!(
            anchor_day = params.anchor_day,
            shift_window = params.shift_window,
            days,
            ground_truth_len = ground_truth.len(),
            "no candidate shift fits inside the ground-truth series"
        );
    }
    best
}

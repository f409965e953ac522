//! Simulator fan-out over a bounded worker pool.
//!
//! One subprocess per grid point; invocations are independent and write to
//! distinct files, so no locking is needed. A failed invocation is logged
//! and counted, never aborts the rest of the sweep.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::config::PipelineConfig;
use crate::grid::ParameterPoint;

/// Counts for one sweep's simulator invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub launched: usize,
    pub failed: usize,
}

/// Removes leftover files from a previous, possibly aborted run.
///
/// Partially written raw tables from a killed sweep must not be trusted, so
/// the output directory starts empty whenever simulations are (re)run.
fn clean_output_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
        return Ok(());
    }
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    if removed > 0 {
        info!(dir = %dir.display(), removed, "cleared stale raw output files");
    }
    Ok(())
}

async fn run_point(config: Arc<PipelineConfig>, point: ParameterPoint, out_path: PathBuf) -> bool {
    let label = point.label();
    debug!(label = %label, "launching simulator");

    let output = Command::new(&config.simulator_bin)
        .arg("--out")
        .arg(&out_path)
        .arg("--config")
        .arg(&config.network_config_folder)
        .arg("--maxT")
        .arg(config.simulated_days.to_string())
        .arg("--c")
        .arg(config.seasonality.to_string())
        .arg("--R0")
        .arg(point.r0.to_string())
        .arg("--R1")
        .arg(point.r1.to_string())
        .arg("--second_wave")
        .arg(point.shift.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            if out_path.is_file() {
                debug!(label = %label, "simulator finished");
                true
            } else {
                error!(label = %label, "simulator exited cleanly but wrote no output file");
                false
            }
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                label = %label,
                status = %output.status,
                stderr = %stderr.trim(),
                "simulator invocation failed"
            );
            false
        }
        Err(e) => {
            error!(label = %label, error = %e, "could not spawn simulator");
            false
        }
    }
}

/// Runs the simulator for every grid point, bounded by `threads` concurrent
/// invocations, and blocks until the pool drains.
#[tracing::instrument(skip(config, points), fields(points = points.len(), threads = config.threads))]
pub async fn run_sweep(config: &PipelineConfig, points: &[ParameterPoint]) -> Result<SweepOutcome> {
    let out_dir = config.sim_output_dir();
    clean_output_dir(&out_dir)?;

    let semaphore = Arc::new(Semaphore::new(config.threads));
    let shared_config = Arc::new(config.clone());

    let mut tasks = Vec::with_capacity(points.len());
    for &point in points {
        let sem = semaphore.clone();
        let config = shared_config.clone();
        let out_path = out_dir.join(point.label());

        tasks.push(tokio::spawn(async move {
            // the pool owner never closes the semaphore
            let _permit = sem.acquire().await.unwrap();
            run_point(config, point, out_path).await
        }));
    }

    let mut failed = 0;
    for task in tasks {
        match task.await {
            Ok(true) => {}
            Ok(false) => failed += 1,
            Err(e) => {
                error!(error = %e, "simulator task panicked");
                failed += 1;
            }
        }
    }

    info!(launched = points.len(), failed, "simulation sweep finished");
    Ok(SweepOutcome { launched: points.len(), failed })
}

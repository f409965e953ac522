//! CLI entry point for the sweep calibration pipeline.
//!
//! Builds the parameter grid, optionally runs the external simulator across
//! it, then aggregates, aligns and scores every grid point against the
//! ground-truth mortality series.

use anyhow::{Context, Result};
use clap::Parser;
use epi_sweep::collect::collect_sweep;
use epi_sweep::config::PipelineConfig;
use epi_sweep::driver::run_sweep;
use epi_sweep::ground_truth::GroundTruthSeries;
use epi_sweep::registry::PopulationRegistry;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "epi_sweep")]
#[command(about = "Calibrate an epidemic simulator against county mortality data", long_about = None)]
struct Cli {
    /// Pipeline configuration file
    #[arg(long, default_value = "input.toml")]
    config: PathBuf,

    /// Run the simulator sweep (otherwise reuse existing raw output)
    #[arg(long, default_value_t = false)]
    sim: bool,

    /// Print the resolved configuration before running
    #[arg(long, default_value_t = false)]
    show_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/epi_sweep.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("epi_sweep.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let config = PipelineConfig::load(&cli.config)?;
    if cli.show_config {
        let rendered = toml::to_string_pretty(&config).context("rendering config")?;
        for line in rendered.lines() {
            info!("  {line}");
        }
    }

    let points = config.grid();
    info!(
        r0_samples = config.first_wave.num,
        r1_samples = config.second_wave.num,
        shift_samples = config.second_wave.time_num,
        points = points.len(),
        "parameter grid built"
    );

    if cli.sim {
        let outcome = run_sweep(&config, &points).await?;
        info!(
            launched = outcome.launched,
            failed = outcome.failed,
            "simulation phase done"
        );
    } else {
        info!(dir = %config.sim_output_dir().display(), "simulations skipped, reusing raw output");
    }

    let registry = PopulationRegistry::from_path(&config.population_file())?;
    info!(network_size = registry.network_size(), "population registry loaded");

    let ground_truth = GroundTruthSeries::from_path(&config.ground_truth)?;
    info!(
        samples = ground_truth.len(),
        start_date = ?ground_truth.start_date,
        "ground truth series derived"
    );

    let summary = collect_sweep(&config, &registry, &ground_truth)?;
    match summary.best {
        Some((point, result)) => info!(
            best = %point.label(),
            loss = result.loss,
            equal_ratio = result.scale,
            shift = result.shift_days,
            evaluated = summary.evaluated,
            failed = summary.failed,
            excluded = summary.excluded,
            "best-fit parameter point"
        ),
        None => info!(
            failed = summary.failed,
            excluded = summary.excluded,
            "no grid point could be evaluated"
        ),
    }

    Ok(())
}

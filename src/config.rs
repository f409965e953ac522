//! Pipeline configuration, loaded from a TOML file.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::grid::{self, ParameterPoint};

fn default_simulator_bin() -> PathBuf {
    PathBuf::from("bin/main")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("log")
}

fn default_threads() -> usize {
    4
}

fn default_anchor_day() -> usize {
    154
}

fn default_shift_window() -> usize {
    80
}

fn default_num() -> usize {
    1
}

/// Linear range for the first-wave reproduction number.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FirstWave {
    /// Range center.
    pub r0: f64,
    /// Range half-width; 0 degenerates to the single center value.
    #[serde(default)]
    pub std: f64,
    /// Sample count (>= 1).
    #[serde(default = "default_num")]
    pub num: usize,
}

/// Linear range for the second-wave reproduction number plus its start day.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecondWave {
    pub r1: f64,
    #[serde(default)]
    pub std: f64,
    #[serde(default = "default_num")]
    pub num: usize,
    /// Second-wave start day passed to the simulator.
    pub time: i64,
    /// Half-width of the start-day sweep, in days.
    #[serde(default)]
    pub time_std: f64,
    #[serde(default = "default_num")]
    pub time_num: usize,
}

/// Composite-loss weighting.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LossWeights {
    /// Weight of the national-aggregate term, in `[0, 1]`; the per-county
    /// term gets the complement.
    pub global_rate: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Run identifier; names the raw-output directory and the artifacts.
    pub sim_id: String,
    /// Number of age groups in the simulated network.
    pub age_groups: usize,
    /// Per-age-group death rates; length must equal `age_groups`.
    pub death_rate: Vec<f64>,
    /// Directory holding the simulator's network configuration, including
    /// the population registry file.
    pub network_config_folder: PathBuf,
    /// Simulated-days horizon passed to the simulator.
    pub simulated_days: usize,
    /// Seasonality coefficient passed to the simulator.
    pub seasonality: f64,
    /// Cumulative daily mortality table, indexed by date and county.
    pub ground_truth: PathBuf,
    #[serde(default = "default_simulator_bin")]
    pub simulator_bin: PathBuf,
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// Worker-pool size for simulator invocations.
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Ground-truth day the zero shift aligns the simulation start to.
    #[serde(default = "default_anchor_day")]
    pub anchor_day: usize,
    /// Number of candidate shifts scanned, starting at 0.
    #[serde(default = "default_shift_window")]
    pub shift_window: usize,
    pub first_wave: FirstWave,
    pub second_wave: SecondWave,
    pub loss: LossWeights,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: PipelineConfig = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Consistency checks that must pass before any simulation runs.
    pub fn validate(&self) -> Result<()> {
        if self.death_rate.len() != self.age_groups {
            bail!(
                "death_rate has {} entries but age_groups is {}",
                self.death_rate.len(),
                self.age_groups
            );
        }
        if !self.network_config_folder.is_dir() {
            bail!(
                "network config folder not found: {}",
                self.network_config_folder.display()
            );
        }
        if !self.ground_truth.is_file() {
            bail!(
                "ground truth file not found: {}",
                self.ground_truth.display()
            );
        }
        if !(0.0..=1.0).contains(&self.loss.global_rate) {
            bail!(
                "loss.global_rate must be in [0, 1], got {}",
                self.loss.global_rate
            );
        }
        if self.first_wave.num < 1 || self.second_wave.num < 1 || self.second_wave.time_num < 1 {
            bail!("sample counts must be >= 1");
        }
        if self.simulated_days == 0 {
            bail!("simulated_days must be >= 1");
        }
        if self.threads == 0 {
            bail!("threads must be >= 1");
        }
        if self.shift_window == 0 {
            bail!("shift_window must be >= 1");
        }
        Ok(())
    }

    /// The full parameter grid for this run.
    pub fn grid(&self) -> Vec<ParameterPoint> {
        let r0s = grid::linspace(self.first_wave.r0, self.first_wave.std, self.first_wave.num);
        let r1s = grid::linspace(self.second_wave.r1, self.second_wave.std, self.second_wave.num);
        let shifts: Vec<i64> = grid::linspace(
            self.second_wave.time as f64,
            self.second_wave.time_std,
            self.second_wave.time_num,
        )
        .into_iter()
        .map(|v| v.round() as i64)
        .collect();
        grid::cartesian(&r0s, &r1s, &shifts)
    }

    /// Directory the simulator writes one raw table per grid point into.
    pub fn sim_output_dir(&self) -> PathBuf {
        self.output_root.join(&self.sim_id)
    }

    /// Directory the distribution and aggregated-curves tables land in.
    pub fn helper_dir(&self) -> PathBuf {
        self.output_root.join("helper")
    }

    pub fn population_file(&self) -> PathBuf {
        self.network_config_folder.join("populations_KSH.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config(dir: &Path) -> PipelineConfig {
        let gt = dir.join("ground_truth.csv");
        std::fs::write(&gt, "").unwrap();
        PipelineConfig {
            sim_id: "test".into(),
            age_groups: 2,
            death_rate: vec![0.01, 0.1],
            network_config_folder: dir.to_path_buf(),
            simulated_days: 10,
            seasonality: 0.3,
            ground_truth: gt,
            simulator_bin: default_simulator_bin(),
            output_root: dir.join("log"),
            threads: 2,
            anchor_day: 154,
            shift_window: 80,
            first_wave: FirstWave { r0: 2.2, std: 0.2, num: 3 },
            second_wave: SecondWave {
                r1: 1.6,
                std: 0.0,
                num: 1,
                time: 120,
                time_std: 0.0,
                time_num: 1,
            },
            loss: LossWeights { global_rate: 0.5 },
        }
    }

    #[test]
    fn test_validate_accepts_consistent_config() {
        let dir = tempfile::tempdir().unwrap();
        sample_config(dir.path()).validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_death_rate_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sample_config(dir.path());
        config.death_rate.push(0.2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_network_folder() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sample_config(dir.path());
        config.network_config_folder = dir.path().join("does-not-exist");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_global_rate() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sample_config(dir.path());
        config.loss.global_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_grid_size() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        assert_eq!(config.grid().len(), 3);
    }

    #[test]
    fn test_toml_roundtrip() {
        let raw = r#"
            sim_id = "sweep_01"
            age_groups = 2
            death_rate = [0.01, 0.1]
            network_config_folder = "input/network"
            simulated_days = 150
            seasonality = 0.3
            ground_truth = "data/deaths_by_county.csv"

            [first_wave]
            r0 = 2.2
            std = 0.3
            num = 5

            [second_wave]
            r1 = 1.6
            time = 120

            [loss]
            global_rate = 0.5
        "#;
        let config: PipelineConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.threads, 4);
        assert_eq!(config.anchor_day, 154);
        assert_eq!(config.second_wave.num, 1);
        assert_eq!(config.grid().len(), 5);
    }
}

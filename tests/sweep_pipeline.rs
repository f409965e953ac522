//! End-to-end tests for the sweep pipeline: raw tables on disk in, artifact
//! tables out.

use epi_sweep::collect::collect_sweep;
use epi_sweep::config::{FirstWave, LossWeights, PipelineConfig, SecondWave};
use epi_sweep::driver::run_sweep;
use epi_sweep::ground_truth::GroundTruthSeries;
use epi_sweep::registry::PopulationRegistry;
use std::fs;
use std::path::Path;

const POPULATIONS: &str = r#"{
    "populations": [
        {"index": 0, "city": "Budapest I.", "admin_municip": "Budapest", "admin_county": "főváros"},
        {"index": 1, "city": "Vác", "admin_municip": "Vác", "admin_county": "Pest"},
        {"index": 2, "city": "Cegléd", "admin_municip": "Cegléd", "admin_county": "Pest"},
        {"index": 3, "city": "Zalaegerszeg", "admin_municip": "Zalaegerszeg", "admin_county": "Zala"}
    ]
}"#;

/// Cumulative mortality, 40 days, constant daily increments. Zala is absent
/// from ground truth on purpose.
fn ground_truth_csv() -> String {
    let mut raw = String::from("Dátum,Budapest,Pest,Összesen\n");
    for day in 0..40 {
        raw.push_str(&format!("d{day},{},{},{}\n", day, 2 * day, 3 * day));
    }
    raw
}

fn write_fixtures(dir: &Path) -> PipelineConfig {
    fs::write(dir.join("populations_KSH.json"), POPULATIONS).unwrap();
    let gt_path = dir.join("ground_truth.csv");
    fs::write(&gt_path, ground_truth_csv()).unwrap();

    PipelineConfig {
        sim_id: "it".into(),
        age_groups: 2,
        death_rate: vec![0.01, 0.1],
        network_config_folder: dir.to_path_buf(),
        simulated_days: 5,
        seasonality: 0.3,
        ground_truth: gt_path,
        simulator_bin: "true".into(),
        output_root: dir.join("log"),
        threads: 2,
        anchor_day: 20,
        shift_window: 10,
        first_wave: FirstWave { r0: 2.0, std: 1.0, num: 3 },
        second_wave: SecondWave {
            r1: 1.5,
            std: 0.5,
            num: 3,
            time: 100,
            time_std: 0.0,
            time_num: 1,
        },
        loss: LossWeights { global_rate: 0.5 },
    }
}

/// A 5-day raw table over all 4 cities and 2 age groups, with magnitudes
/// depending on the parameter point so every point scores differently.
fn raw_table(r0: f64, r1: f64) -> String {
    let mut raw = String::from("day,I_0_0,I_0_1,I_1_0,I_2_1,I_3_0,I2_0_0,I2_3_1,S_0_0\n");
    for day in 0..5 {
        let bump = (day as f64 + 1.0) * r0;
        let tail = r1 / 2.0;
        raw.push_str(&format!(
            "{day},{bump},{tail},{bump},{tail},{bump},{tail},{bump},999\n"
        ));
    }
    raw
}

fn load_inputs(config: &PipelineConfig) -> (PopulationRegistry, GroundTruthSeries) {
    let registry = PopulationRegistry::from_path(&config.population_file()).unwrap();
    let ground_truth = GroundTruthSeries::from_path(&config.ground_truth).unwrap();
    (registry, ground_truth)
}

#[test]
fn eight_of_nine_points_survive_one_corrupt_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixtures(dir.path());
    let raw_dir = config.sim_output_dir();
    fs::create_dir_all(&raw_dir).unwrap();

    let mut written = 0;
    for &r0 in &[1.0, 2.0, 3.0] {
        for &r1 in &[1.0, 1.5, 2.0] {
            let name = format!("R0={r0}_R1={r1}_shift=100");
            written += 1;
            if written == 5 {
                // this invocation "failed": truncated, unreadable output
                fs::write(raw_dir.join(name), "I_0_0\nnot-a-number\n").unwrap();
            } else {
                fs::write(raw_dir.join(name), raw_table(r0, r1)).unwrap();
            }
        }
    }

    let (registry, ground_truth) = load_inputs(&config);
    let summary = collect_sweep(&config, &registry, &ground_truth).unwrap();

    assert_eq!(summary.evaluated, 8);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.excluded, 0);

    let distribution =
        fs::read_to_string(config.helper_dir().join("it_distribution.csv")).unwrap();
    let lines: Vec<_> = distribution.lines().collect();
    assert_eq!(lines.len(), 9); // header + 8 rows
    assert_eq!(lines[0], "point,R0,R1,R1_shift,loss,equal_ratio,shift");

    // the corrupt point (r0=2, r1=1.5) must not appear
    assert!(!distribution.contains("2.0,1.5,100"));

    // best is one of the 8 evaluated points
    let (best_point, _) = summary.best.unwrap();
    assert!(distribution.contains(&format!("{:?},{:?},", best_point.r0, best_point.r1)));
}

#[test]
fn aggregated_table_has_one_column_per_point_plus_ground_truth() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixtures(dir.path());
    let raw_dir = config.sim_output_dir();
    fs::create_dir_all(&raw_dir).unwrap();

    for &r0 in &[1.0, 2.0] {
        fs::write(
            raw_dir.join(format!("R0={r0}_R1=1.5_shift=100")),
            raw_table(r0, 1.5),
        )
        .unwrap();
    }

    let (registry, ground_truth) = load_inputs(&config);
    let summary = collect_sweep(&config, &registry, &ground_truth).unwrap();
    assert_eq!(summary.evaluated, 2);

    let agg = fs::read_to_string(config.helper_dir().join("it_agg.csv")).unwrap();
    let header: Vec<_> = agg.lines().next().unwrap().split(',').collect();
    // day index + ground truth + one column per evaluated point
    assert_eq!(header.len(), summary.evaluated + 2);
    assert_eq!(header[0], "day");
    assert_eq!(header[1], "Ground truth");
    assert_eq!(header[2], "1_1.5_100");
    assert_eq!(header[3], "2_1.5_100");
    assert_eq!(agg.lines().count(), config.simulated_days + 1);

    // supplemental per-age table for the best point
    let ages = fs::read_to_string(config.helper_dir().join("it_ages.csv")).unwrap();
    assert_eq!(ages.lines().next().unwrap(), "day,0,1");
}

#[test]
fn zero_sum_point_is_excluded_with_no_row() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixtures(dir.path());
    let raw_dir = config.sim_output_dir();
    fs::create_dir_all(&raw_dir).unwrap();

    fs::write(
        raw_dir.join("R0=1_R1=1_shift=100"),
        raw_table(1.0, 1.0),
    )
    .unwrap();
    let mut zeros = String::from("day,I_0_0,I_1_1\n");
    for day in 0..5 {
        zeros.push_str(&format!("{day},0,0\n"));
    }
    fs::write(raw_dir.join("R0=2_R1=1_shift=100"), zeros).unwrap();

    let (registry, ground_truth) = load_inputs(&config);
    let summary = collect_sweep(&config, &registry, &ground_truth).unwrap();

    assert_eq!(summary.evaluated, 1);
    assert_eq!(summary.excluded, 1);
    let distribution =
        fs::read_to_string(config.helper_dir().join("it_distribution.csv")).unwrap();
    assert_eq!(distribution.lines().count(), 2);
}

#[test]
fn repeated_collection_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixtures(dir.path());
    let raw_dir = config.sim_output_dir();
    fs::create_dir_all(&raw_dir).unwrap();

    for &r0 in &[1.0, 2.0, 3.0] {
        for &r1 in &[1.0, 2.0] {
            fs::write(
                raw_dir.join(format!("R0={r0}_R1={r1}_shift=100")),
                raw_table(r0, r1),
            )
            .unwrap();
        }
    }

    let (registry, ground_truth) = load_inputs(&config);
    collect_sweep(&config, &registry, &ground_truth).unwrap();
    let distribution_path = config.helper_dir().join("it_distribution.csv");
    let agg_path = config.helper_dir().join("it_agg.csv");
    let first_distribution = fs::read(&distribution_path).unwrap();
    let first_agg = fs::read(&agg_path).unwrap();

    collect_sweep(&config, &registry, &ground_truth).unwrap();
    assert_eq!(fs::read(&distribution_path).unwrap(), first_distribution);
    assert_eq!(fs::read(&agg_path).unwrap(), first_agg);
}

#[cfg(unix)]
mod driver {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[tokio::test]
    async fn failed_invocations_are_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_fixtures(dir.path());
        config.simulator_bin = write_script(dir.path(), "sim_fail.sh", "#!/bin/sh\nexit 1\n");

        let points = config.grid();
        let outcome = run_sweep(&config, &points).await.unwrap();
        assert_eq!(outcome.launched, 9);
        assert_eq!(outcome.failed, 9);
    }

    #[tokio::test]
    async fn successful_invocations_write_labeled_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_fixtures(dir.path());
        config.simulator_bin = write_script(
            dir.path(),
            "sim_ok.sh",
            "#!/bin/sh\n\
             while [ \"$#\" -gt 0 ]; do\n\
               case \"$1\" in --out) out=\"$2\"; shift ;; esac\n\
               shift\n\
             done\n\
             printf 'day,I_0_0\\n0,1\\n1,2\\n' > \"$out\"\n",
        );

        let points = config.grid();
        let outcome = run_sweep(&config, &points).await.unwrap();
        assert_eq!(outcome.failed, 0);

        let mut names: Vec<_> = fs::read_dir(config.sim_output_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names.len(), 9);
        assert!(names.iter().all(|n| n.starts_with("R0=")));
    }

    #[tokio::test]
    async fn rerun_clears_stale_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_fixtures(dir.path());
        config.simulator_bin = write_script(dir.path(), "sim_fail.sh", "#!/bin/sh\nexit 1\n");

        let raw_dir = config.sim_output_dir();
        fs::create_dir_all(&raw_dir).unwrap();
        let stale = raw_dir.join("R0=9_R1=9_shift=9");
        fs::write(&stale, "orphaned partial output").unwrap();

        run_sweep(&config, &config.grid()).await.unwrap();
        assert!(!stale.exists());
    }
}

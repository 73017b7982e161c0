//! End-to-end runs of the batch analysis over a synthetic recording folder.

use std::fs;
use std::path::Path;

use approx::assert_abs_diff_eq;

use vection_blend::output::write_telemetry_csv;
use vection_blend::{
    create_timestamped_output_dir, run_batch, simulate_trial, AnalysisConfig, BlendMode,
    BlendRegion, SimConfig, TelemetryTable, VelocityParameters,
};

const STAMP: &str = "20250715_144516_Fps1_CameraSpeed1";

fn phase_file(participant: &str, trial: u32, mode: &str) -> String {
    format!(
        "{STAMP}_ExperimentPattern_Phase_ParticipantName_{participant}_TrialNumber_{trial}_BrightnessBlendMode_{mode}.csv"
    )
}

fn function_mix_file(participant: &str, trial: u32) -> String {
    format!("{STAMP}_ExperimentPattern_FunctionMix_ParticipantName_{participant}_TrialNumber_{trial}.csv")
}

fn write_function_mix(dir: &Path, participant: &str, trial: u32, final_ratio: f64) {
    let content = format!(
        "Time, Knob, FunctionRatio\n0.0, 0.20, 0.20\n0.5, 0.50, 0.50\n1.0, {final_ratio}, {final_ratio}\n1.5, {final_ratio},\n"
    );
    fs::write(dir.join(function_mix_file(participant, trial)), content).unwrap();
}

fn write_phase(dir: &Path, participant: &str, trial: u32, mode: &str, target: &VelocityParameters) {
    let config = SimConfig {
        samples_per_step: 12,
        seed: u64::from(trial),
        ..SimConfig::default()
    };
    let rows = simulate_trial(target, &config).unwrap();
    write_telemetry_csv(&dir.join(phase_file(participant, trial, mode)), &rows).unwrap();
}

#[test]
fn batch_writes_every_output() {
    let input = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();

    write_function_mix(input.path(), "ONO", 1, 0.4);
    write_function_mix(input.path(), "ONO", 2, 0.6);
    write_function_mix(input.path(), "ONO", 3, 0.5);

    let first = VelocityParameters::new(1.0, 0.4, 0.2, 0.1, 1.0);
    let second = VelocityParameters::new(2.0, 0.6, 0.4, 0.3, 2.0);
    write_phase(input.path(), "ONO", 1, "Dynamic", &first);
    write_phase(input.path(), "ONO", 2, "Dynamic", &second);
    write_phase(input.path(), "ONO", 1, "LinearOnly", &first);

    fs::write(input.path().join("Test_recording.csv"), "Time\n0.0\n").unwrap();
    fs::write(input.path().join("calibration.csv"), "Time\n0.0\n").unwrap();

    let output_dir = create_timestamped_output_dir(root.path()).unwrap();
    let config = AnalysisConfig {
        curve_samples: 21,
        velocity_samples: 50,
        ..AnalysisConfig::default()
    };
    let summary = run_batch(&config, input.path(), &output_dir).unwrap();

    assert_eq!(summary.files_seen, 8);
    assert_eq!(summary.files_skipped, 2);
    assert_eq!(summary.exploration_trials, 3);
    assert_eq!(summary.phase_trials, 3);
    assert_eq!(summary.malformed_trials, 0);
    assert_eq!(summary.groups, 2);

    let ono = &summary.participants["ONO"];
    assert_abs_diff_eq!(ono.function_ratio(), 0.5, epsilon = 1e-12);
    assert_eq!(ono.region(), BlendRegion::CosineToLinear);

    for name in [
        "exploration_trials.csv",
        "participant_ratios.csv",
        "blend_curves.csv",
        "trial_parameters.csv",
        "parameter_summary.csv",
        "velocity_curves.csv",
        "summary.json",
    ] {
        assert!(output_dir.join(name).is_file(), "missing {name}");
    }

    let curves = fs::read_to_string(output_dir.join("blend_curves.csv")).unwrap();
    assert_eq!(curves.lines().count(), 22);

    let velocity = fs::read_to_string(output_dir.join("velocity_curves.csv")).unwrap();
    assert_eq!(velocity.lines().count(), 1 + 2 * 50);

    let parameters = fs::read_to_string(output_dir.join("parameter_summary.csv")).unwrap();
    let v0_dynamic = parameters
        .lines()
        .find(|line| line.starts_with("ONO,Dynamic,V0,"))
        .unwrap();
    let fields: Vec<&str> = v0_dynamic.split(',').collect();
    assert_eq!(fields[3], "2");
    assert_abs_diff_eq!(fields[4].parse::<f64>().unwrap(), 1.5, epsilon = 1e-9);
    assert_abs_diff_eq!(fields[6].parse::<f64>().unwrap(), 0.5, epsilon = 1e-9);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(output_dir.join("summary.json")).unwrap())
            .unwrap();
    assert_eq!(json["phase_trials"], 3);
}

#[test]
fn malformed_trials_are_reported_and_skipped() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    let target = VelocityParameters::new(1.41, -1.0, 4.92, 0.44, 1.29);
    write_phase(input.path(), "HOU", 1, "Dynamic", &target);
    fs::write(
        input.path().join(phase_file("HOU", 2, "Dynamic")),
        "Time, Velocity, Amplitude\n0.0, 1.0,\n",
    )
    .unwrap();
    fs::write(input.path().join(phase_file("HOU", 3, "Dynamic")), "").unwrap();

    let summary = run_batch(&AnalysisConfig::default(), input.path(), output.path()).unwrap();
    assert_eq!(summary.phase_trials, 3);
    assert_eq!(summary.malformed_trials, 2);
    assert_eq!(summary.groups, 1);

    let trials = fs::read_to_string(output.path().join("trial_parameters.csv")).unwrap();
    assert_eq!(trials.lines().filter(|line| line.ends_with(",ok")).count(), 1);
    assert!(!output.path().join("exploration_trials.csv").exists());
}

#[test]
fn simulated_file_reads_back_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let target = VelocityParameters::new(1.41, -1.0, 4.92, 0.44, 1.29);
    write_phase(dir.path(), "ONO", 4, "Dynamic", &target);

    let table = TelemetryTable::from_path(&dir.path().join(phase_file("ONO", 4, "Dynamic")))
        .unwrap();
    let params = vection_blend::extract_table(&table).into_result().unwrap();
    for (got, want) in params.as_array().iter().zip(target.as_array()) {
        assert_abs_diff_eq!(*got, want, epsilon = 1e-9);
    }
}

#[test]
fn speed_equivalence_compares_each_mode_to_exploration() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    for (trial, knob) in [(1, 0.4), (2, 0.6)] {
        fs::write(
            input.path().join(function_mix_file("KK", trial)),
            format!("Time, Knob, FunctionRatio\n0.0, {knob}, 0.5\n1.0, {knob}, 0.5\n"),
        )
        .unwrap();
    }
    for (mode, knobs) in [("Dynamic", (0.5, 0.6)), ("LinearOnly", (0.5, 0.5))] {
        fs::write(
            input.path().join(phase_file("KK", 1, mode)),
            format!(
                "Time, StepNumber, Velocity, Amplitude, Knob\n0.0, 0, 1.2, , {}\n1.0, 1, 1.2, 0.3, {}\n",
                knobs.0, knobs.1
            ),
        )
        .unwrap();
    }

    let summary = run_batch(&AnalysisConfig::default(), input.path(), output.path()).unwrap();
    assert_eq!(summary.speed_equivalence.len(), 2);

    let dynamic = summary
        .speed_equivalence
        .iter()
        .find(|mode| mode.group.blend_mode == Some(BlendMode::Dynamic))
        .unwrap();
    assert_abs_diff_eq!(dynamic.equivalence.baseline_knob, 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(dynamic.equivalence.baseline_std, 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(dynamic.equivalence.mode_mean, 0.55, epsilon = 1e-12);
    assert_abs_diff_eq!(
        dynamic.equivalence.deviation_percent.unwrap(),
        10.0,
        epsilon = 1e-9
    );

    let linear = summary
        .speed_equivalence
        .iter()
        .find(|mode| mode.group.blend_mode == Some(BlendMode::LinearOnly))
        .unwrap();
    assert_abs_diff_eq!(linear.equivalence.deviation_percent.unwrap(), 0.0, epsilon = 1e-9);

    let table = fs::read_to_string(output.path().join("speed_equivalence.csv")).unwrap();
    assert_eq!(table.lines().count(), 3);
    assert!(table.lines().any(|line| line.starts_with("KK,Dynamic,")));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(output.path().join("summary.json")).unwrap())
            .unwrap();
    assert_eq!(json["speed_equivalence"][0]["participant"], "KK");
}

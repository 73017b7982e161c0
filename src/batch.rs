//! Directory-level analysis of recorded trials
//!
//! FunctionMix trials yield each participant's function ratio and knob
//! baseline, Phase trials yield velocity-model parameters and knob levels
//! aggregated per participant and blend mode.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::{GroupKey, ParameterAggregator};
use crate::config::AnalysisConfig;
use crate::exploration::{
    final_function_ratio, ExplorationSummary, KnobMetrics, ModeEquivalence, SpeedEquivalence,
};
use crate::output::{
    write_blend_curves_csv, write_exploration_trials_csv, write_json,
    write_parameter_summary_csv, write_participant_ratios_csv, write_speed_equivalence_csv,
    write_trial_parameters_csv, write_velocity_curves_csv, ExplorationTrialRow, TrialParameterRow,
};
use crate::params::VelocityParameters;
use crate::telemetry::TelemetryTable;
use crate::trial::{ExperimentPattern, TrialDescriptor};
use crate::velocity::{extract_table, sample_velocity};
use crate::VectionError;

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub output_dir: PathBuf,
    pub files_seen: usize,
    /// Test recordings, unparseable names, unknown patterns, filtered modes
    pub files_skipped: usize,
    pub exploration_trials: usize,
    pub phase_trials: usize,
    /// Trials whose telemetry could not be read or carried no usable data
    pub malformed_trials: usize,
    pub participants: BTreeMap<String, ExplorationSummary>,
    pub groups: usize,
    pub speed_equivalence: Vec<ModeEquivalence>,
}

/// CSV files directly under `input_dir`, sorted by name.
pub fn list_trial_files(input_dir: &Path) -> Result<Vec<PathBuf>, VectionError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(input_dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn blend_mode_label(descriptor: &TrialDescriptor) -> String {
    descriptor
        .blend_mode
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn is_test_recording(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.contains("Test"))
}

pub fn run_batch(
    config: &AnalysisConfig,
    input_dir: &Path,
    output_dir: &Path,
) -> Result<BatchSummary, VectionError> {
    config.validate()?;
    fs::create_dir_all(output_dir)?;

    let mode_filter = config.blend_mode_filter();
    let mut summary = BatchSummary {
        output_dir: output_dir.to_path_buf(),
        ..BatchSummary::default()
    };

    let mut exploration_rows = Vec::new();
    let mut ratios: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut baseline_knobs: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut parameter_rows = Vec::new();
    let mut aggregator = ParameterAggregator::new();
    let mut phase_knobs: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();

    for path in list_trial_files(input_dir)? {
        summary.files_seen += 1;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();

        if config.skip_test_files && is_test_recording(&path) {
            debug!(file = %file_name, "skipping test recording");
            summary.files_skipped += 1;
            continue;
        }

        let descriptor = match TrialDescriptor::from_path(&path) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                warn!(file = %file_name, error = %err, "skipping file");
                summary.files_skipped += 1;
                continue;
            }
        };

        match descriptor.pattern {
            ExperimentPattern::FunctionMix => {}
            ExperimentPattern::Phase => {
                if let Some(filter) = &mode_filter {
                    if descriptor.blend_mode.as_ref() != Some(filter) {
                        debug!(file = %file_name, "blend mode filtered out");
                        summary.files_skipped += 1;
                        continue;
                    }
                }
            }
            ExperimentPattern::Other(ref pattern) => {
                warn!(file = %file_name, pattern = %pattern, "unknown experiment pattern");
                summary.files_skipped += 1;
                continue;
            }
        }

        let table = match TelemetryTable::from_path(&path) {
            Ok(table) => table,
            Err(err) => {
                warn!(file = %file_name, error = %err, "unreadable telemetry");
                summary.malformed_trials += 1;
                if descriptor.pattern == ExperimentPattern::Phase {
                    summary.phase_trials += 1;
                    parameter_rows.push(TrialParameterRow {
                        file_name,
                        blend_mode: blend_mode_label(&descriptor),
                        participant: descriptor.participant,
                        trial: descriptor.trial,
                        params: VelocityParameters::zero(),
                        knob: None,
                        issue: Some(err.to_string()),
                    });
                } else {
                    summary.exploration_trials += 1;
                }
                continue;
            }
        };
        let knob = KnobMetrics::from_table(&table, config.adjustment_threshold);

        if descriptor.pattern == ExperimentPattern::FunctionMix {
            summary.exploration_trials += 1;
            let final_ratio = final_function_ratio(&table);
            match final_ratio {
                Some(ratio) => ratios
                    .entry(descriptor.participant.clone())
                    .or_default()
                    .push(ratio),
                None => {
                    warn!(file = %file_name, "no FunctionRatio recorded");
                    summary.malformed_trials += 1;
                }
            }
            debug!(
                participant = %descriptor.participant,
                trial = descriptor.trial,
                ratio = ?final_ratio,
                "exploration trial"
            );

            if let Some(metrics) = &knob {
                baseline_knobs
                    .entry(descriptor.participant.clone())
                    .or_default()
                    .push(metrics.mean);
            }

            exploration_rows.push(ExplorationTrialRow {
                file_name,
                participant: descriptor.participant,
                trial: descriptor.trial,
                final_ratio,
                knob,
            });
            continue;
        }

        summary.phase_trials += 1;
        let extraction = extract_table(&table);
        match &extraction.issue {
            Some(issue) => {
                warn!(file = %file_name, issue = %issue, "skipping malformed trial");
                summary.malformed_trials += 1;
            }
            None => {
                debug!(
                    participant = %descriptor.participant,
                    trial = descriptor.trial,
                    params = ?extraction.params,
                    "phase trial"
                );
                let key = GroupKey {
                    participant: descriptor.participant.clone(),
                    blend_mode: descriptor.blend_mode.clone(),
                };
                if let Some(metrics) = &knob {
                    phase_knobs.entry(key.clone()).or_default().push(metrics.mean);
                }
                aggregator.push(key, extraction.params);
            }
        }

        parameter_rows.push(TrialParameterRow {
            file_name,
            blend_mode: blend_mode_label(&descriptor),
            participant: descriptor.participant,
            trial: descriptor.trial,
            params: extraction.params,
            knob,
            issue: extraction.issue.map(|issue| issue.to_string()),
        });
    }

    summary.participants = ratios
        .iter()
        .filter_map(|(participant, values)| {
            ExplorationSummary::from_ratios(values).map(|s| (participant.clone(), s))
        })
        .collect();

    summary.speed_equivalence = phase_knobs
        .into_iter()
        .filter_map(|(group, mode_means)| {
            let baseline = baseline_knobs.get(&group.participant)?;
            SpeedEquivalence::compare(baseline, &mode_means)
                .map(|equivalence| ModeEquivalence { group, equivalence })
        })
        .collect();

    if !exploration_rows.is_empty() {
        write_exploration_trials_csv(&output_dir.join("exploration_trials.csv"), &exploration_rows)?;

        let participant_summaries: Vec<(String, ExplorationSummary)> = summary
            .participants
            .iter()
            .map(|(participant, s)| (participant.clone(), s.clone()))
            .collect();
        write_participant_ratios_csv(
            &output_dir.join("participant_ratios.csv"),
            &participant_summaries,
        )?;

        if config.write_curves {
            let curves: Vec<(String, f64)> = participant_summaries
                .iter()
                .map(|(participant, s)| (participant.clone(), s.function_ratio()))
                .collect();
            write_blend_curves_csv(
                &output_dir.join("blend_curves.csv"),
                config.curve_samples,
                &curves,
            )?;
        }
    }

    if !parameter_rows.is_empty() {
        write_trial_parameters_csv(&output_dir.join("trial_parameters.csv"), &parameter_rows)?;

        let group_summaries = aggregator.summaries();
        summary.groups = group_summaries.len();
        write_parameter_summary_csv(&output_dir.join("parameter_summary.csv"), &group_summaries)?;

        if config.write_curves {
            let curves: Vec<(GroupKey, _)> = group_summaries
                .iter()
                .map(|(key, s)| {
                    let points = sample_velocity(
                        &s.mean_parameters(),
                        config.velocity_periods,
                        config.velocity_samples,
                    );
                    (key.clone(), points)
                })
                .collect();
            write_velocity_curves_csv(&output_dir.join("velocity_curves.csv"), &curves)?;
        }
    }

    if !summary.speed_equivalence.is_empty() {
        write_speed_equivalence_csv(
            &output_dir.join("speed_equivalence.csv"),
            &summary.speed_equivalence,
        )?;
    }

    write_json(&output_dir.join("summary.json"), &summary)?;

    info!(
        files = summary.files_seen,
        skipped = summary.files_skipped,
        malformed = summary.malformed_trials,
        groups = summary.groups,
        "batch complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::write_telemetry_csv;
    use crate::sim::{simulate_trial, SimConfig};

    fn phase_name(participant: &str, trial: u32, mode: &str) -> String {
        format!(
            "20250715_144516_Fps1_CameraSpeed1_ExperimentPattern_Phase_ParticipantName_{participant}_TrialNumber_{trial}_BrightnessBlendMode_{mode}.csv"
        )
    }

    fn write_phase(dir: &Path, name: &str, target: &VelocityParameters) {
        let config = SimConfig {
            samples_per_step: 8,
            ..SimConfig::default()
        };
        let rows = simulate_trial(target, &config).unwrap();
        write_telemetry_csv(&dir.join(name), &rows).unwrap();
    }

    #[test]
    fn test_list_trial_files_sorted_csv_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.csv"), "").unwrap();
        fs::write(dir.path().join("a.CSV"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = list_trial_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.CSV", "b.csv"]);
    }

    #[test]
    fn test_blend_mode_filter_skips_other_modes() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let target = VelocityParameters::new(1.2, 0.5, 0.3, 0.2, 1.0);
        write_phase(input.path(), &phase_name("ONO", 1, "Dynamic"), &target);
        write_phase(input.path(), &phase_name("ONO", 1, "LinearOnly"), &target);

        let config = AnalysisConfig {
            blend_mode: Some("Dynamic".to_string()),
            write_curves: false,
            ..AnalysisConfig::default()
        };
        let summary = run_batch(&config, input.path(), output.path()).unwrap();
        assert_eq!(summary.files_seen, 2);
        assert_eq!(summary.files_skipped, 1);
        assert_eq!(summary.phase_trials, 1);
        assert_eq!(summary.groups, 1);
        assert!(!output.path().join("velocity_curves.csv").exists());
    }

    #[test]
    fn test_malformed_phase_trial_is_counted_not_aggregated() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(
            input.path().join(phase_name("HOU", 2, "Dynamic")),
            "Time, Velocity\n0.0, 1.0\n",
        )
        .unwrap();

        let summary = run_batch(&AnalysisConfig::default(), input.path(), output.path()).unwrap();
        assert_eq!(summary.phase_trials, 1);
        assert_eq!(summary.malformed_trials, 1);
        assert_eq!(summary.groups, 0);

        let rows = fs::read_to_string(output.path().join("trial_parameters.csv")).unwrap();
        assert!(rows.contains("skipped"));
    }

    #[test]
    fn test_unreadable_phase_trial_is_listed() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(
            input.path().join(phase_name("HOU", 1, "LinearOnly")),
            b"Time,\xff\xfe\n0.0,1.0\n",
        )
        .unwrap();

        let summary = run_batch(&AnalysisConfig::default(), input.path(), output.path()).unwrap();
        assert_eq!(summary.phase_trials, 1);
        assert_eq!(summary.malformed_trials, 1);

        let rows = fs::read_to_string(output.path().join("trial_parameters.csv")).unwrap();
        let row = rows.lines().nth(1).unwrap();
        assert!(row.contains("HOU"));
        assert!(row.contains("skipped: csv error"));
    }

    #[test]
    fn test_phase_knob_metrics_feed_speed_equivalence() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(
            input.path().join(
                "ExperimentPattern_FunctionMix_ParticipantName_KK_TrialNumber_1.csv",
            ),
            "Time, Knob, FunctionRatio\n0.0, 0.4, 0.4\n1.0, 0.4, 0.4\n",
        )
        .unwrap();
        fs::write(
            input.path().join(phase_name("KK", 1, "Dynamic")),
            "Time, StepNumber, Velocity, Amplitude, Knob\n0.0, 0, 1.0, , 0.3\n1.0, 1, 1.0, 0.2, 0.3\n",
        )
        .unwrap();

        let summary = run_batch(&AnalysisConfig::default(), input.path(), output.path()).unwrap();
        assert_eq!(summary.speed_equivalence.len(), 1);
        let mode = &summary.speed_equivalence[0];
        assert_eq!(mode.group.blend_mode, Some(crate::trial::BlendMode::Dynamic));
        assert!((mode.equivalence.baseline_knob - 0.4).abs() < 1e-12);
        assert!((mode.equivalence.mode_mean - 0.3).abs() < 1e-12);
        assert!((mode.equivalence.deviation_percent.unwrap() - 25.0).abs() < 1e-9);

        let rows = fs::read_to_string(output.path().join("trial_parameters.csv")).unwrap();
        assert!(rows.lines().next().unwrap().contains("knob_mean"));
        assert!(output.path().join("speed_equivalence.csv").is_file());
    }
}

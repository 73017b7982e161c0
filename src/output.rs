use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::Writer;
use serde::Serialize;

use crate::aggregate::{GroupKey, ParameterSummary};
use crate::blend::{self, BaseCurve, BlendRegion};
use crate::exploration::{ExplorationSummary, KnobMetrics, ModeEquivalence};
use crate::params::VelocityParameters;
use crate::telemetry::TelemetryRow;
use crate::velocity::VelocityPoint;
use crate::VectionError;

#[derive(Debug, Clone)]
pub struct ExplorationTrialRow {
    pub file_name: String,
    pub participant: String,
    pub trial: u32,
    pub final_ratio: Option<f64>,
    pub knob: Option<KnobMetrics>,
}

#[derive(Debug, Clone)]
pub struct TrialParameterRow {
    pub file_name: String,
    pub participant: String,
    pub trial: u32,
    pub blend_mode: String,
    pub params: VelocityParameters,
    pub knob: Option<KnobMetrics>,
    /// Why the trial was left out of aggregation
    pub issue: Option<String>,
}

const KNOB_HEADER: [&str; 7] = [
    "knob_samples",
    "knob_mean",
    "knob_std",
    "knob_median",
    "knob_cv",
    "response_time",
    "adjustments",
];

/// Create `<root>/<UTC stamp>`, suffixing `-NN` if the stamp is taken.
pub fn create_timestamped_output_dir(root: &Path) -> Result<PathBuf, VectionError> {
    fs::create_dir_all(root)?;

    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let mut output_dir = root.join(&timestamp);
    let mut counter = 1_u32;

    while output_dir.exists() {
        output_dir = root.join(format!("{timestamp}-{counter:02}"));
        counter += 1;
    }

    fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn fmt_f64(value: f64) -> String {
    format!("{value:.10}")
}

fn fmt_option_f64(value: Option<f64>) -> String {
    value.map(fmt_f64).unwrap_or_default()
}

fn knob_fields(knob: Option<&KnobMetrics>) -> [String; 7] {
    [
        knob.map(|m| m.samples.to_string()).unwrap_or_default(),
        fmt_option_f64(knob.map(|m| m.mean)),
        fmt_option_f64(knob.map(|m| m.std_dev)),
        fmt_option_f64(knob.map(|m| m.median)),
        fmt_option_f64(knob.and_then(|m| m.coefficient_of_variation)),
        fmt_option_f64(knob.map(|m| m.response_time)),
        knob.map(|m| m.adjustments.to_string()).unwrap_or_default(),
    ]
}

fn blend_mode_label(key: &GroupKey) -> String {
    key.blend_mode
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default()
}

pub fn write_exploration_trials_csv(
    path: &Path,
    rows: &[ExplorationTrialRow],
) -> Result<(), VectionError> {
    let mut writer = Writer::from_path(path)?;
    let mut header = vec!["file", "participant", "trial", "final_ratio"];
    header.extend(KNOB_HEADER);
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.file_name.clone(),
            row.participant.clone(),
            row.trial.to_string(),
            fmt_option_f64(row.final_ratio),
        ];
        record.extend(knob_fields(row.knob.as_ref()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_participant_ratios_csv(
    path: &Path,
    summaries: &[(String, ExplorationSummary)],
) -> Result<(), VectionError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record([
        "participant",
        "trials",
        "mean",
        "std_dev",
        "median",
        "function_ratio",
        "region",
    ])?;

    for (participant, summary) in summaries {
        writer.write_record([
            participant.clone(),
            summary.trials.len().to_string(),
            fmt_f64(summary.mean),
            fmt_f64(summary.std_dev),
            fmt_f64(summary.median),
            fmt_f64(summary.function_ratio()),
            summary.region().label().to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Base curves plus one blended column per `(label, k)` pair.
pub fn write_blend_curves_csv(
    path: &Path,
    samples: usize,
    curves: &[(String, f64)],
) -> Result<(), VectionError> {
    let mut writer = Writer::from_path(path)?;

    let mut header = vec!["x".to_string()];
    header.extend(BaseCurve::ALL.iter().map(|curve| curve.name().to_string()));
    header.extend(curves.iter().map(|(label, _)| format!("blend_{label}")));
    writer.write_record(&header)?;

    for x in blend::linspace(0.0, 1.0, samples) {
        let mut record = vec![fmt_f64(x)];
        record.extend(BaseCurve::ALL.iter().map(|curve| fmt_f64(curve.eval(x))));
        record.extend(curves.iter().map(|&(_, k)| fmt_f64(blend::blend(x, k))));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_curve_points_csv(
    path: &Path,
    k: f64,
    points: &[blend::CurvePoint],
) -> Result<(), VectionError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["x", "blend", "k", "region"])?;
    let region = BlendRegion::classify(k).label();

    for point in points {
        writer.write_record([
            fmt_f64(point.x),
            fmt_f64(point.y),
            fmt_f64(k),
            region.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_trial_parameters_csv(
    path: &Path,
    rows: &[TrialParameterRow],
) -> Result<(), VectionError> {
    let mut writer = Writer::from_path(path)?;
    let mut header = vec!["file", "participant", "trial", "blend_mode"];
    header.extend(VelocityParameters::NAMES);
    header.extend(["phi1_pi", "phi2_pi"]);
    header.extend(KNOB_HEADER);
    header.push("status");
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.file_name.clone(),
            row.participant.clone(),
            row.trial.to_string(),
            row.blend_mode.clone(),
        ];
        record.extend(row.params.as_array().map(fmt_f64));
        let (phi1_pi, phi2_pi) = row.params.phase_in_pi_units();
        record.push(fmt_f64(phi1_pi));
        record.push(fmt_f64(phi2_pi));
        record.extend(knob_fields(row.knob.as_ref()));
        record.push(match &row.issue {
            Some(issue) => format!("skipped: {issue}"),
            None => "ok".to_string(),
        });
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Long format: one line per group and parameter.
pub fn write_parameter_summary_csv(
    path: &Path,
    summaries: &[(GroupKey, ParameterSummary)],
) -> Result<(), VectionError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record([
        "participant",
        "blend_mode",
        "parameter",
        "count",
        "mean",
        "median",
        "std_dev",
    ])?;

    for (key, summary) in summaries {
        for (name, stats) in VelocityParameters::NAMES.iter().zip(summary.as_array()) {
            writer.write_record([
                key.participant.clone(),
                blend_mode_label(key),
                name.to_string(),
                stats.count.to_string(),
                fmt_f64(stats.mean),
                fmt_f64(stats.median),
                fmt_f64(stats.std_dev),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}

pub fn write_speed_equivalence_csv(
    path: &Path,
    rows: &[ModeEquivalence],
) -> Result<(), VectionError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record([
        "participant",
        "blend_mode",
        "baseline_knob",
        "baseline_std",
        "trials",
        "mode_mean",
        "mode_std",
        "deviation_percent",
    ])?;

    for ModeEquivalence { group, equivalence } in rows {
        writer.write_record([
            group.participant.clone(),
            blend_mode_label(group),
            fmt_f64(equivalence.baseline_knob),
            fmt_f64(equivalence.baseline_std),
            equivalence.trials.to_string(),
            fmt_f64(equivalence.mode_mean),
            fmt_f64(equivalence.mode_std),
            fmt_option_f64(equivalence.deviation_percent),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_velocity_curves_csv(
    path: &Path,
    curves: &[(GroupKey, Vec<VelocityPoint>)],
) -> Result<(), VectionError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["participant", "blend_mode", "t", "velocity"])?;

    for (key, points) in curves {
        let mode = blend_mode_label(key);
        for point in points {
            writer.write_record([
                key.participant.clone(),
                mode.clone(),
                fmt_f64(point.t),
                fmt_f64(point.v),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}

pub fn write_velocity_points_csv(path: &Path, points: &[VelocityPoint]) -> Result<(), VectionError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["t", "velocity"])?;
    for point in points {
        writer.write_record([fmt_f64(point.t), fmt_f64(point.v)])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write rows in the recorder's layout, leading-space headers included.
pub fn write_telemetry_csv(path: &Path, rows: &[TelemetryRow]) -> Result<(), VectionError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["Time", " StepNumber", " Velocity", " Amplitude"])?;

    for row in rows {
        writer.write_record([
            fmt_option_f64(row.time),
            row.step_number.to_string(),
            fmt_option_f64(row.velocity),
            fmt_option_f64(row.amplitude),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), VectionError> {
    let payload = serde_json::to_string_pretty(value)?;
    fs::write(path, payload)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetryTable;
    use crate::velocity::extract_table;

    #[test]
    fn test_timestamped_dirs_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let first = create_timestamped_output_dir(root.path()).unwrap();
        let second = create_timestamped_output_dir(root.path()).unwrap();
        assert_ne!(first, second);
        assert!(first.is_dir() && second.is_dir());
    }

    #[test]
    fn test_telemetry_csv_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trial.csv");
        let rows = vec![
            TelemetryRow::velocity(0, 1.41).at(0.0),
            TelemetryRow::amplitude(1, -1.0).at(0.1),
            TelemetryRow::amplitude(3, 0.44).at(0.2),
        ];
        write_telemetry_csv(&path, &rows).unwrap();

        let table = TelemetryTable::from_path(&path).unwrap();
        let params = extract_table(&table).into_result().unwrap();
        assert_eq!(params, VelocityParameters::new(1.41, -1.0, 0.0, 0.44, 0.0));
    }

    #[test]
    fn test_blend_curves_csv_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curves.csv");
        let curves = vec![("ONO".to_string(), 0.583), ("HOU".to_string(), 0.316)];
        write_blend_curves_csv(&path, 11, &curves).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 12);
        assert_eq!(lines[0], "x,cosine,linear,arccos,blend_ONO,blend_HOU");
    }
}

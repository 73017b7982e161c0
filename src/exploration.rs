//! FunctionMix exploration trials
//!
//! In the exploration half of the experiment a participant drives the
//! control value freely until the blended playback looks right. The value
//! left standing at the end of each trial is that trial's function ratio;
//! the median over a participant's trials becomes their fixed `k` for the
//! Phase trials that follow, and the knob level settled there is compared
//! back against the exploration baseline per blend mode.

use serde::Serialize;

use crate::aggregate::{median, population_std, GroupKey};
use crate::blend::BlendRegion;
use crate::telemetry::TelemetryTable;

/// Default `|Δknob|` above which a sample counts as a deliberate adjustment.
pub const DEFAULT_ADJUSTMENT_THRESHOLD: f64 = 0.01;

/// Last non-empty `FunctionRatio` in the trial.
pub fn final_function_ratio(table: &TelemetryTable) -> Option<f64> {
    table
        .samples
        .iter()
        .rev()
        .find_map(|sample| sample.function_ratio)
}

/// Per-participant summary of exploration outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplorationSummary {
    pub trials: Vec<f64>,
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
}

impl ExplorationSummary {
    /// `None` when there are no trials.
    pub fn from_ratios(ratios: &[f64]) -> Option<Self> {
        if ratios.is_empty() {
            return None;
        }

        let mean = ratios.iter().sum::<f64>() / ratios.len() as f64;
        Some(Self {
            trials: ratios.to_vec(),
            mean,
            std_dev: population_std(ratios, mean),
            median: median(ratios)?,
        })
    }

    /// The fixed control value carried into Phase trials.
    pub fn function_ratio(&self) -> f64 {
        self.median
    }

    pub fn region(&self) -> BlendRegion {
        BlendRegion::classify(self.median)
    }
}

/// Response statistics of the knob trace within one trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnobMetrics {
    pub samples: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1)
    pub std_dev: f64,
    pub median: f64,
    /// `std_dev / mean`, absent when the mean is zero
    pub coefficient_of_variation: Option<f64>,
    /// Last minus first recorded `Time`
    pub response_time: f64,
    pub adjustments: usize,
}

impl KnobMetrics {
    /// `None` when fewer than two knob samples were recorded.
    pub fn from_table(table: &TelemetryTable, adjustment_threshold: f64) -> Option<Self> {
        let trace: Vec<(Option<f64>, f64)> = table
            .samples
            .iter()
            .filter_map(|sample| sample.knob.map(|knob| (sample.time, knob)))
            .collect();

        if trace.len() < 2 {
            return None;
        }

        let knobs: Vec<f64> = trace.iter().map(|&(_, knob)| knob).collect();
        let n = knobs.len() as f64;
        let mean = knobs.iter().sum::<f64>() / n;
        let sum_sq: f64 = knobs.iter().map(|&k| (k - mean) * (k - mean)).sum();
        let std_dev = (sum_sq / (n - 1.0)).sqrt();

        let coefficient_of_variation = if mean != 0.0 {
            Some(std_dev / mean)
        } else {
            None
        };

        let times: Vec<f64> = trace.iter().filter_map(|&(time, _)| time).collect();
        let response_time = match (times.first(), times.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        };

        let adjustments = knobs
            .windows(2)
            .filter(|pair| (pair[1] - pair[0]).abs() > adjustment_threshold)
            .count();

        Some(Self {
            samples: knobs.len(),
            mean,
            std_dev,
            median: median(&knobs)?,
            coefficient_of_variation,
            response_time,
            adjustments,
        })
    }
}

/// How closely one blend mode's settled knob matches the exploration baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedEquivalence {
    /// Mean of the FunctionMix trials' knob means
    pub baseline_knob: f64,
    pub baseline_std: f64,
    pub trials: usize,
    /// Mean of this mode's Phase-trial knob means
    pub mode_mean: f64,
    pub mode_std: f64,
    /// `|mode_mean - baseline| / baseline * 100`, absent when the baseline is zero
    pub deviation_percent: Option<f64>,
}

impl SpeedEquivalence {
    /// Compare per-trial knob means; `None` when either side has no trials.
    pub fn compare(baseline_knob_means: &[f64], mode_knob_means: &[f64]) -> Option<Self> {
        if baseline_knob_means.is_empty() || mode_knob_means.is_empty() {
            return None;
        }

        let baseline_knob = mean(baseline_knob_means);
        let mode_mean = mean(mode_knob_means);
        let deviation_percent = if baseline_knob != 0.0 {
            Some((mode_mean - baseline_knob).abs() / baseline_knob * 100.0)
        } else {
            None
        };

        Some(Self {
            baseline_knob,
            baseline_std: population_std(baseline_knob_means, baseline_knob),
            trials: mode_knob_means.len(),
            mode_mean,
            mode_std: population_std(mode_knob_means, mode_mean),
            deviation_percent,
        })
    }
}

/// [`SpeedEquivalence`] of one participant under one blend mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeEquivalence {
    #[serde(flatten)]
    pub group: GroupKey,
    #[serde(flatten)]
    pub equivalence: SpeedEquivalence,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

//! Descriptive statistics across repeated trials

use std::collections::BTreeMap;

use serde::Serialize;

use crate::params::VelocityParameters;
use crate::trial::BlendMode;

/// Median of `values` under `f64::total_cmp` ordering; `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(0.5 * (sorted[mid - 1] + sorted[mid]))
    } else {
        Some(sorted[mid])
    }
}

/// Population standard deviation around a precomputed mean.
pub fn population_std(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|&v| (v - mean) * (v - mean)).sum();
    (sum_sq / values.len() as f64).sqrt()
}

/// Mean / median / population SD of one quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
}

impl Summary {
    pub fn of(values: &[f64]) -> Option<Self> {
        let median = median(values)?;
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self {
            count: values.len(),
            mean,
            median,
            std_dev: population_std(values, mean),
        })
    }
}

/// One [`Summary`] per velocity parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterSummary {
    pub v0: Summary,
    pub a1: Summary,
    pub phi1: Summary,
    pub a2: Summary,
    pub phi2: Summary,
}

impl ParameterSummary {
    /// `None` when `trials` is empty.
    pub fn from_trials(trials: &[VelocityParameters]) -> Option<Self> {
        let column = |idx: usize| -> Option<Summary> {
            let values: Vec<f64> = trials.iter().map(|p| p.as_array()[idx]).collect();
            Summary::of(&values)
        };

        Some(Self {
            v0: column(0)?,
            a1: column(1)?,
            phi1: column(2)?,
            a2: column(3)?,
            phi2: column(4)?,
        })
    }

    pub fn as_array(&self) -> [Summary; 5] {
        [self.v0, self.a1, self.phi1, self.a2, self.phi2]
    }

    /// Parameters built from the per-field means.
    pub fn mean_parameters(&self) -> VelocityParameters {
        VelocityParameters::from_array(self.as_array().map(|s| s.mean))
    }

    pub fn median_parameters(&self) -> VelocityParameters {
        VelocityParameters::from_array(self.as_array().map(|s| s.median))
    }
}

/// Aggregation bucket: one participant under one blend mode.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    pub participant: String,
    pub blend_mode: Option<BlendMode>,
}

/// Collects extracted trials and summarises them per group.
///
/// Malformed trials must be filtered out by the caller before `push`.
#[derive(Debug, Clone, Default)]
pub struct ParameterAggregator {
    groups: BTreeMap<GroupKey, Vec<VelocityParameters>>,
}

impl ParameterAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: GroupKey, params: VelocityParameters) {
        self.groups.entry(key).or_default().push(params);
    }

    pub fn trial_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn trials(&self, key: &GroupKey) -> &[VelocityParameters] {
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Summaries in group key order.
    pub fn summaries(&self) -> Vec<(GroupKey, ParameterSummary)> {
        self.groups
            .iter()
            .filter_map(|(key, trials)| {
                ParameterSummary::from_trials(trials).map(|summary| (key.clone(), summary))
            })
            .collect()
    }
}

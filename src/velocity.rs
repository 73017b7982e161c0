//! Velocity model extraction and evaluation
//!
//! A Phase trial walks the participant through five sequential adjustment
//! steps. Step 0 sets the baseline velocity, steps 1..4 set `A1, φ1, A2, φ2`
//! through the shared `Amplitude` column. The value left standing when a
//! step ends is the participant's answer for that parameter.
//!
//! "Left standing" means the last non-empty reading of the step. A step whose
//! final row has a blank cell keeps the reading before it rather than turning
//! into NaN, unlike a plain last-row lookup.

use std::f64::consts::{PI, TAU};

use serde::Serialize;

use crate::params::VelocityParameters;
use crate::telemetry::{MalformedTelemetry, TelemetryRow, TelemetryTable};
use crate::VectionError;

/// Angular frequency of the fundamental: one cycle per unit time.
pub const OMEGA: f64 = TAU;

/// Number of adjustment steps in a Phase trial.
pub const STEP_COUNT: usize = 5;

/// Result of one extraction pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    /// Extracted parameters, all zero when `issue` is set
    pub params: VelocityParameters,
    /// Set when the trial should be skipped rather than aggregated
    pub issue: Option<MalformedTelemetry>,
}

impl Extraction {
    fn malformed(issue: MalformedTelemetry) -> Self {
        Self {
            params: VelocityParameters::zero(),
            issue: Some(issue),
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.issue.is_some()
    }

    pub fn into_result(self) -> Result<VelocityParameters, VectionError> {
        match self.issue {
            Some(issue) => Err(issue.into()),
            None => Ok(self.params),
        }
    }
}

/// Single-pass extractor holding the last value seen per step.
#[derive(Debug, Clone, Default)]
pub struct VelocityModelExtractor {
    last: [Option<f64>; STEP_COUNT],
    rows: usize,
}

impl VelocityModelExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one row; rows must arrive in recording order.
    pub fn observe(&mut self, row: &TelemetryRow) {
        self.rows += 1;

        let value = match row.step_number {
            0 => row.velocity,
            1..=4 => row.amplitude,
            _ => None,
        };

        if let Some(value) = value {
            // step_number is within 0..=4 here
            self.last[row.step_number as usize] = Some(value);
        }
    }

    /// Number of rows observed so far.
    pub fn rows_seen(&self) -> usize {
        self.rows
    }

    /// Finish the pass. Steps never observed default to `0`.
    pub fn finish(&self) -> Extraction {
        if self.rows == 0 {
            return Extraction::malformed(MalformedTelemetry::Empty);
        }

        let mut values = [0.0; STEP_COUNT];
        for (slot, last) in values.iter_mut().zip(self.last.iter()) {
            *slot = last.unwrap_or(0.0);
        }

        Extraction {
            params: VelocityParameters::from_array(values),
            issue: None,
        }
    }
}

/// Extract parameters from validated rows in recording order.
pub fn extract(rows: &[TelemetryRow]) -> Extraction {
    let mut extractor = VelocityModelExtractor::new();
    for row in rows {
        extractor.observe(row);
    }
    extractor.finish()
}

/// Extract parameters from a raw trial table, checking its schema first.
pub fn extract_table(table: &TelemetryTable) -> Extraction {
    if table.is_empty() {
        return Extraction::malformed(MalformedTelemetry::Empty);
    }

    match table.phase_rows() {
        Ok(rows) => extract(&rows),
        Err(issue) => Extraction::malformed(issue),
    }
}

/// Velocity at time `t` under the recorded phase convention.
///
/// `v(t) = V0 + A1·sin(ωt + φ1 + π) + A2·sin(2ωt + φ2 + π)`, `ω = 2π`
pub fn velocity(t: f64, params: &VelocityParameters) -> f64 {
    params.v0
        + params.a1 * (OMEGA * t + params.phi1 + PI).sin()
        + params.a2 * (2.0 * OMEGA * t + params.phi2 + PI).sin()
}

/// Velocity at time `t` without the recorded `+π` offset.
pub fn velocity_textbook(t: f64, params: &VelocityParameters) -> f64 {
    params.v0
        + params.a1 * (OMEGA * t + params.phi1).sin()
        + params.a2 * (2.0 * OMEGA * t + params.phi2).sin()
}

/// One sampled point of a velocity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VelocityPoint {
    pub t: f64,
    pub v: f64,
}

/// Sample `velocity` at `n` evenly spaced times over `[0, periods]`.
pub fn sample_velocity(params: &VelocityParameters, periods: f64, n: usize) -> Vec<VelocityPoint> {
    crate::blend::linspace(0.0, periods, n)
        .into_iter()
        .map(|t| VelocityPoint {
            t,
            v: velocity(t, params),
        })
        .collect()
}

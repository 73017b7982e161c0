//! Synthetic Phase-trial telemetry
//!
//! Generates the knob trace a participant would leave while settling each of
//! the five parameters in turn. Useful for exercising the extractor and the
//! batch pipeline without recorded data.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::params::VelocityParameters;
use crate::telemetry::TelemetryRow;
use crate::velocity::STEP_COUNT;
use crate::VectionError;

/// Simulation configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Rows recorded per adjustment step
    pub samples_per_step: usize,
    /// Time between rows
    pub dt: f64,
    /// Standard deviation of the hand jitter while adjusting
    pub jitter_sigma: f64,
    /// Velocity shown when step 0 begins
    pub start_velocity: f64,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            samples_per_step: 40,
            dt: 1.0 / 60.0,
            jitter_sigma: 0.05,
            start_velocity: 1.0,
            seed: 42,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), VectionError> {
        if self.samples_per_step == 0 {
            return Err(VectionError::InvalidConfig(
                "samples_per_step must be greater than zero".to_string(),
            ));
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(VectionError::InvalidConfig(
                "dt must be finite and positive".to_string(),
            ));
        }
        if !self.jitter_sigma.is_finite() || self.jitter_sigma < 0.0 {
            return Err(VectionError::InvalidConfig(
                "jitter_sigma must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Simulate one Phase trial that settles on `target`.
///
/// Each step ramps from its starting value towards the target with jitter
/// that fades out as the participant converges; the last row of every step
/// holds the target exactly.
pub fn simulate_trial(
    target: &VelocityParameters,
    config: &SimConfig,
) -> Result<Vec<TelemetryRow>, VectionError> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let jitter = Normal::new(0.0, config.jitter_sigma)
        .map_err(|err| VectionError::InvalidConfig(format!("jitter distribution: {err}")))?;

    let targets = target.as_array();
    let mut rows = Vec::with_capacity(STEP_COUNT * config.samples_per_step);
    let n = config.samples_per_step;

    for (step, &goal) in targets.iter().enumerate() {
        let start = if step == 0 { config.start_velocity } else { 0.0 };

        for i in 0..n {
            let t = rows.len() as f64 * config.dt;
            let progress = (i + 1) as f64 / n as f64;
            let value = if i + 1 == n {
                goal
            } else {
                start + (goal - start) * progress + jitter.sample(&mut rng) * (1.0 - progress)
            };

            let row = if step == 0 {
                TelemetryRow::velocity(0, value)
            } else {
                TelemetryRow {
                    // velocity display holds the settled baseline after step 0
                    velocity: Some(targets[0]),
                    ..TelemetryRow::amplitude(step as i64, value)
                }
            };
            rows.push(row.at(t));
        }
    }

    Ok(rows)
}

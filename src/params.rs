//! Velocity model parameters
//!
//! The five scalars recovered from one Phase trial

use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

/// Parameters of `v(t) = V0 + A1·sin(ωt+φ1+π) + A2·sin(2ωt+φ2+π)`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityParameters {
    /// Baseline velocity (last `Velocity` of step 0)
    pub v0: f64,
    /// Fundamental amplitude (step 1)
    pub a1: f64,
    /// Fundamental phase as recorded (step 2)
    pub phi1: f64,
    /// Second harmonic amplitude (step 3)
    pub a2: f64,
    /// Second harmonic phase as recorded (step 4)
    pub phi2: f64,
}

impl VelocityParameters {
    /// Column labels, in tuple order
    pub const NAMES: [&'static str; 5] = ["V0", "A1", "phi1", "A2", "phi2"];

    /// Create new velocity parameters
    pub fn new(v0: f64, a1: f64, phi1: f64, a2: f64, phi2: f64) -> Self {
        Self {
            v0,
            a1,
            phi1,
            a2,
            phi2,
        }
    }

    /// All-zero parameters, the fill value for unusable telemetry
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn as_array(&self) -> [f64; 5] {
        [self.v0, self.a1, self.phi1, self.a2, self.phi2]
    }

    pub fn from_array(values: [f64; 5]) -> Self {
        let [v0, a1, phi1, a2, phi2] = values;
        Self::new(v0, a1, phi1, a2, phi2)
    }

    /// `(φ1/π, φ2/π)`
    pub fn phase_in_pi_units(&self) -> (f64, f64) {
        (self.phi1 / PI, self.phi2 / PI)
    }

    /// Fold the recorded `+π` offset into the phases, wrapped to `[0, 2π)`.
    ///
    /// Evaluating the result with the textbook formula reproduces the
    /// recorded-convention curve of `self`.
    pub fn textbook_phases(&self) -> Self {
        Self {
            phi1: wrap_phase(self.phi1 + PI),
            phi2: wrap_phase(self.phi2 + PI),
            ..*self
        }
    }
}

fn wrap_phase(phase: f64) -> f64 {
    let wrapped = phase.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

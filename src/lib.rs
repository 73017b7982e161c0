//! vection-blend - blend curves and velocity models for vection experiments
//!
//! Two pure components sit at the core of the speed-perception analysis:
//! the brightness blend-curve evaluator, which maps a control value `k` onto
//! a cross-fade between cosine, linear and arccos easing, and the velocity
//! model extractor, which recovers `(V0, A1, φ1, A2, φ2)` from step-tagged
//! trial telemetry. The remaining modules are the batch plumbing around them.

pub mod aggregate;
pub mod batch;
pub mod blend;
pub mod config;
pub mod exploration;
pub mod output;
pub mod params;
pub mod sim;
pub mod telemetry;
pub mod trial;
pub mod velocity;

use thiserror::Error;

// Re-export main types
pub use aggregate::{ParameterAggregator, ParameterSummary, Summary};
pub use batch::{run_batch, BatchSummary};
pub use blend::{blend, BaseCurve, BlendRegion};
pub use config::AnalysisConfig;
pub use exploration::{
    final_function_ratio, ExplorationSummary, KnobMetrics, ModeEquivalence, SpeedEquivalence,
};
pub use output::create_timestamped_output_dir;
pub use params::VelocityParameters;
pub use sim::{simulate_trial, SimConfig};
pub use telemetry::{MalformedTelemetry, TelemetryRow, TelemetryTable};
pub use trial::{BlendMode, ExperimentPattern, TrialDescriptor};
pub use velocity::{extract, extract_table, velocity, Extraction, VelocityModelExtractor};

#[derive(Debug, Error)]
pub enum VectionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unrecognised trial file name: {0}")]
    InvalidFileName(String),
    #[error("malformed telemetry: {0}")]
    MalformedTelemetry(#[from] MalformedTelemetry),
}

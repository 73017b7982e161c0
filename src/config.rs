//! JSON analysis configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

use crate::exploration::DEFAULT_ADJUSTMENT_THRESHOLD;
use crate::trial::BlendMode;
use crate::VectionError;

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "vection.json";

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    #[serde_as(as = "DefaultOnNull")]
    pub curve_samples: usize,
    #[serde_as(as = "DefaultOnNull")]
    pub velocity_samples: usize,
    #[serde_as(as = "DefaultOnNull")]
    pub velocity_periods: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub adjustment_threshold: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub skip_test_files: bool,
    #[serde_as(as = "DefaultOnNull")]
    pub write_curves: bool,
    #[serde(default)]
    pub blend_mode: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            curve_samples: 500,
            velocity_samples: 1000,
            velocity_periods: 2.0,
            adjustment_threshold: DEFAULT_ADJUSTMENT_THRESHOLD,
            skip_test_files: true,
            write_curves: true,
            blend_mode: None,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), VectionError> {
        if self.curve_samples == 0 {
            return Err(VectionError::InvalidConfig(
                "curve_samples must be greater than zero".to_string(),
            ));
        }

        if self.velocity_samples == 0 {
            return Err(VectionError::InvalidConfig(
                "velocity_samples must be greater than zero".to_string(),
            ));
        }

        if !self.velocity_periods.is_finite() || self.velocity_periods <= 0.0 {
            return Err(VectionError::InvalidConfig(
                "velocity_periods must be finite and positive".to_string(),
            ));
        }

        if !self.adjustment_threshold.is_finite() || self.adjustment_threshold < 0.0 {
            return Err(VectionError::InvalidConfig(
                "adjustment_threshold must be finite and non-negative".to_string(),
            ));
        }

        Ok(())
    }

    /// Blend mode filter for Phase trials, `None` keeps every mode.
    pub fn blend_mode_filter(&self) -> Option<BlendMode> {
        self.blend_mode.as_deref().map(BlendMode::parse)
    }

    pub fn load_file(path: &Path) -> Result<Self, VectionError> {
        let raw = fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Explicit path, else `vection.json` in the working directory, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, VectionError> {
        if let Some(path) = path {
            return Self::load_file(path);
        }

        let cwd_config = PathBuf::from(DEFAULT_CONFIG_FILE);
        if cwd_config.exists() {
            return Self::load_file(&cwd_config);
        }

        Ok(Self::default())
    }
}

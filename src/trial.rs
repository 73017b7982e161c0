//! Trial file descriptors
//!
//! The recorder names every trial file after its settings, e.g.
//! `20250715_144516_Fps1_CameraSpeed1_ExperimentPattern_Phase_ParticipantName_ONO_TrialNumber_1_BrightnessBlendMode_Dynamic.csv`.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::VectionError;

const KEY_PATTERN: &str = "ExperimentPattern";
const KEY_PARTICIPANT: &str = "ParticipantName";
const KEY_TRIAL: &str = "TrialNumber";
const KEY_BLEND_MODE: &str = "BrightnessBlendMode";
const PREFIX_FPS: &str = "Fps";
const PREFIX_CAMERA_SPEED: &str = "CameraSpeed";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ExperimentPattern {
    /// Free exploration of the control value
    FunctionMix,
    /// Step-wise velocity parameter adjustment
    Phase,
    Other(String),
}

impl ExperimentPattern {
    fn parse(raw: &str) -> Self {
        match raw {
            "FunctionMix" => Self::FunctionMix,
            "Phase" => Self::Phase,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ExperimentPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FunctionMix => f.write_str("FunctionMix"),
            Self::Phase => f.write_str("Phase"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// How brightness was cross-faded during a Phase trial.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum BlendMode {
    /// Plain linear cross-fade
    LinearOnly,
    /// Participant's own function ratio
    Dynamic,
    Other(String),
}

impl BlendMode {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "LinearOnly" => Self::LinearOnly,
            "Dynamic" => Self::Dynamic,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinearOnly => f.write_str("LinearOnly"),
            Self::Dynamic => f.write_str("Dynamic"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialDescriptor {
    /// `YYYYMMDD_HHMMSS` recording stamp, if present
    pub timestamp: Option<String>,
    pub fps: Option<u32>,
    pub camera_speed: Option<u32>,
    pub pattern: ExperimentPattern,
    pub participant: String,
    pub trial: u32,
    pub blend_mode: Option<BlendMode>,
}

impl TrialDescriptor {
    pub fn from_path(path: &Path) -> Result<Self, VectionError> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| VectionError::InvalidFileName(path.display().to_string()))?;
        Self::parse(name)
    }

    pub fn parse(file_name: &str) -> Result<Self, VectionError> {
        let invalid = || VectionError::InvalidFileName(file_name.to_string());
        let stem = file_name
            .strip_suffix(".csv")
            .or_else(|| file_name.strip_suffix(".CSV"))
            .unwrap_or(file_name);
        let tokens: Vec<&str> = stem.split('_').collect();

        let timestamp = match tokens.as_slice() {
            [date, time, ..] if is_digits(date, 8) && is_digits(time, 6) => {
                Some(format!("{date}_{time}"))
            }
            _ => None,
        };

        let mut fps = None;
        let mut camera_speed = None;
        let mut pattern = None;
        let mut participant = None;
        let mut trial = None;
        let mut blend_mode = None;

        let mut iter = tokens.iter().copied();
        while let Some(token) = iter.next() {
            match token {
                KEY_PATTERN => pattern = iter.next().map(ExperimentPattern::parse),
                KEY_PARTICIPANT => participant = iter.next().map(str::to_string),
                KEY_TRIAL => {
                    trial = Some(
                        iter.next()
                            .and_then(|raw| raw.parse::<u32>().ok())
                            .ok_or_else(invalid)?,
                    )
                }
                KEY_BLEND_MODE => blend_mode = iter.next().map(BlendMode::parse),
                _ => {
                    if let Some(value) = numeric_suffix(token, PREFIX_FPS) {
                        fps = Some(value);
                    } else if let Some(value) = numeric_suffix(token, PREFIX_CAMERA_SPEED) {
                        camera_speed = Some(value);
                    }
                }
            }
        }

        Ok(Self {
            timestamp,
            fps,
            camera_speed,
            pattern: pattern.ok_or_else(invalid)?,
            participant: participant.filter(|p| !p.is_empty()).ok_or_else(invalid)?,
            trial: trial.ok_or_else(invalid)?,
            blend_mode,
        })
    }

    /// Render back into the recorder's naming convention.
    pub fn file_name(&self) -> String {
        let mut parts = Vec::new();
        if let Some(timestamp) = &self.timestamp {
            parts.push(timestamp.clone());
        }
        if let Some(fps) = self.fps {
            parts.push(format!("{PREFIX_FPS}{fps}"));
        }
        if let Some(speed) = self.camera_speed {
            parts.push(format!("{PREFIX_CAMERA_SPEED}{speed}"));
        }
        parts.push(format!("{KEY_PATTERN}_{}", self.pattern));
        parts.push(format!("{KEY_PARTICIPANT}_{}", self.participant));
        parts.push(format!("{KEY_TRIAL}_{}", self.trial));
        if let Some(mode) = &self.blend_mode {
            parts.push(format!("{KEY_BLEND_MODE}_{mode}"));
        }
        format!("{}.csv", parts.join("_"))
    }
}

fn is_digits(token: &str, len: usize) -> bool {
    token.len() == len && token.bytes().all(|b| b.is_ascii_digit())
}

fn numeric_suffix(token: &str, prefix: &str) -> Option<u32> {
    token.strip_prefix(prefix)?.parse().ok()
}

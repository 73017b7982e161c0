//! Trial telemetry ingestion
//!
//! The recorder writes one CSV per trial with a header row whose column
//! names carry incidental leading whitespace (`Time, Knob, Velocity, ...`).
//! Headers are trimmed here so the rest of the crate only ever sees the
//! typed [`TelemetryTable`] / [`TelemetryRow`] views.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use thiserror::Error;

use crate::VectionError;

pub const COL_TIME: &str = "Time";
pub const COL_STEP: &str = "StepNumber";
pub const COL_VELOCITY: &str = "Velocity";
pub const COL_AMPLITUDE: &str = "Amplitude";
pub const COL_KNOB: &str = "Knob";
pub const COL_FUNCTION_RATIO: &str = "FunctionRatio";

/// Schema-level problems that make a trial unusable for extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum MalformedTelemetry {
    #[error("required column `{0}` is missing")]
    MissingColumn(&'static str),
    #[error("no usable telemetry rows")]
    Empty,
}

/// Which of the known columns were present in the header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Columns {
    pub time: bool,
    pub step_number: bool,
    pub velocity: bool,
    pub amplitude: bool,
    pub knob: bool,
    pub function_ratio: bool,
}

/// One raw CSV record; every field is optional until validated.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetrySample {
    pub time: Option<f64>,
    pub step_number: Option<i64>,
    pub velocity: Option<f64>,
    pub amplitude: Option<f64>,
    pub knob: Option<f64>,
    pub function_ratio: Option<f64>,
}

/// One validated row of a Phase trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRow {
    pub step_number: i64,
    pub time: Option<f64>,
    pub velocity: Option<f64>,
    pub amplitude: Option<f64>,
}

impl TelemetryRow {
    /// Step 0 row carrying a baseline velocity.
    pub fn velocity(step_number: i64, velocity: f64) -> Self {
        Self {
            step_number,
            time: None,
            velocity: Some(velocity),
            amplitude: None,
        }
    }

    /// Step 1..4 row carrying an amplitude / phase value.
    pub fn amplitude(step_number: i64, amplitude: f64) -> Self {
        Self {
            step_number,
            time: None,
            velocity: None,
            amplitude: Some(amplitude),
        }
    }

    pub fn at(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }
}

/// All samples of one trial file, in recording order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryTable {
    pub columns: Columns,
    pub samples: Vec<TelemetrySample>,
}

#[derive(Debug, Default)]
struct ColumnIndex {
    time: Option<usize>,
    step_number: Option<usize>,
    velocity: Option<usize>,
    amplitude: Option<usize>,
    knob: Option<usize>,
    function_ratio: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Self {
        let mut index = Self::default();
        for (idx, name) in headers.iter().enumerate() {
            let slot = match name.trim() {
                COL_TIME => &mut index.time,
                COL_STEP => &mut index.step_number,
                COL_VELOCITY => &mut index.velocity,
                COL_AMPLITUDE => &mut index.amplitude,
                COL_KNOB => &mut index.knob,
                COL_FUNCTION_RATIO => &mut index.function_ratio,
                _ => continue,
            };
            // first occurrence wins on duplicated headers
            if slot.is_none() {
                *slot = Some(idx);
            }
        }
        index
    }

    fn columns(&self) -> Columns {
        Columns {
            time: self.time.is_some(),
            step_number: self.step_number.is_some(),
            velocity: self.velocity.is_some(),
            amplitude: self.amplitude.is_some(),
            knob: self.knob.is_some(),
            function_ratio: self.function_ratio.is_some(),
        }
    }

    fn sample(&self, record: &StringRecord) -> TelemetrySample {
        let float = |slot: Option<usize>| slot.and_then(|idx| record.get(idx)).and_then(parse_f64);
        TelemetrySample {
            time: float(self.time),
            step_number: float(self.step_number).and_then(integral_step),
            velocity: float(self.velocity),
            amplitude: float(self.amplitude),
            knob: float(self.knob),
            function_ratio: float(self.function_ratio),
        }
    }
}

fn parse_f64(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().filter(|value| !value.is_nan())
}

fn integral_step(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 {
        Some(value as i64)
    } else {
        None
    }
}

impl TelemetryTable {
    /// Read a trial CSV (header row required).
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, VectionError> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let index = ColumnIndex::from_headers(csv_reader.headers()?);
        let mut samples = Vec::new();
        for record in csv_reader.records() {
            samples.push(index.sample(&record?));
        }

        Ok(Self {
            columns: index.columns(),
            samples,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, VectionError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Build a table directly from validated rows.
    pub fn from_rows(rows: &[TelemetryRow]) -> Self {
        let samples = rows
            .iter()
            .map(|row| TelemetrySample {
                time: row.time,
                step_number: Some(row.step_number),
                velocity: row.velocity,
                amplitude: row.amplitude,
                ..TelemetrySample::default()
            })
            .collect();

        Self {
            columns: Columns {
                time: true,
                step_number: true,
                velocity: true,
                amplitude: true,
                ..Columns::default()
            },
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Validated Phase rows, in recording order.
    ///
    /// Samples without a usable integral `StepNumber` are dropped.
    pub fn phase_rows(&self) -> Result<Vec<TelemetryRow>, MalformedTelemetry> {
        if !self.columns.step_number {
            return Err(MalformedTelemetry::MissingColumn(COL_STEP));
        }

        Ok(self
            .samples
            .iter()
            .filter_map(|sample| {
                sample.step_number.map(|step_number| TelemetryRow {
                    step_number,
                    time: sample.time,
                    velocity: sample.velocity,
                    amplitude: sample.amplitude,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHASE_CSV: &str = "Time, Knob, Velocity, StepNumber, Amplitude\n\
        0.0, 0.5, 1.20, 0, \n\
        0.1, 0.5, 1.41, 0, \n\
        0.2, 0.5, , 1, -1.0\n\
        0.3, 0.5, , 2.0, 4.92\n\
        0.4, 0.5, , , 9.9\n";

    #[test]
    fn test_headers_are_trimmed() {
        let table = TelemetryTable::from_reader(PHASE_CSV.as_bytes()).unwrap();
        assert!(table.columns.time);
        assert!(table.columns.step_number);
        assert!(table.columns.amplitude);
        assert!(!table.columns.function_ratio);
        assert_eq!(table.len(), 5);
        assert_eq!(table.samples[1].velocity, Some(1.41));
        assert_eq!(table.samples[0].amplitude, None);
    }

    #[test]
    fn test_phase_rows_drop_unstepped_samples() {
        let table = TelemetryTable::from_reader(PHASE_CSV.as_bytes()).unwrap();
        let rows = table.phase_rows().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3].step_number, 2);
        assert_eq!(rows[3].amplitude, Some(4.92));
    }

    #[test]
    fn test_missing_step_column() {
        let csv = "Time, Knob, FunctionRatio\n0.0, 0.2, 0.3\n";
        let table = TelemetryTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(
            table.phase_rows(),
            Err(MalformedTelemetry::MissingColumn(COL_STEP))
        );
    }

    #[test]
    fn test_nan_and_garbage_cells_are_empty() {
        let csv = "StepNumber,Velocity\n0,NaN\n0,abc\n1.5,2.0\n";
        let table = TelemetryTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.samples[0].velocity, None);
        assert_eq!(table.samples[1].velocity, None);
        assert_eq!(table.samples[2].step_number, None);
    }

    #[test]
    fn test_from_rows() {
        let rows = [TelemetryRow::velocity(0, 1.0).at(0.5)];
        let table = TelemetryTable::from_rows(&rows);
        assert_eq!(table.phase_rows().unwrap(), rows.to_vec());
    }
}

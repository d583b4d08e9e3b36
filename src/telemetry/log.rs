//! JSON-lines telemetry log with hourly rotation

use std::io::{self, Write};
use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};

use super::TelemetrySample;
use crate::error::{MspError, Result};

/// Appends one JSON object per sample to `telemetry.<date-hour>.jsonl`
pub struct TelemetryLog {
    writer: RollingFileAppender,
    records: u64,
}

impl TelemetryLog {
    /// Create a log writing into `dir`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns error if the directory or log file cannot be created
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let writer = RollingFileAppender::builder()
            .rotation(Rotation::HOURLY)
            .filename_prefix("telemetry")
            .filename_suffix("jsonl")
            .build(dir.as_ref())
            .map_err(|e| MspError::Io(io::Error::new(io::ErrorKind::Other, e)))?;

        Ok(Self { writer, records: 0 })
    }

    /// Append one sample
    pub fn write(&mut self, sample: &TelemetrySample) -> Result<()> {
        let mut line = serde_json::to_vec(sample).map_err(io::Error::from)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.records += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Samples written since the log was opened
    pub fn records(&self) -> u64 {
        self.records
    }
}

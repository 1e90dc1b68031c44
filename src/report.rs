//! Report sink: where saved results go.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collector::Platform;
use crate::model::MemoryData;

/// Everything collected during one session, as handed to a sink.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct MemoryReport {
    /// RFC 3339 in the serialized form.
    pub generated_at: DateTime<Utc>,
    pub platform: Platform,
    /// Completed collection ticks.
    pub ticks: u64,
    pub data: MemoryData,
}

impl MemoryReport {
    pub fn new(platform: Platform, ticks: u64, data: MemoryData) -> Self {
        Self {
            generated_at: Utc::now(),
            platform,
            ticks,
            data,
        }
    }
}

#[derive(Debug)]
pub enum SinkError {
    Io(io::Error),
    Encode(serde_json::Error),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "report I/O error: {}", e),
            SinkError::Encode(e) => write!(f, "report encoding error: {}", e),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Io(e) => Some(e),
            SinkError::Encode(e) => Some(e),
        }
    }
}

impl From<io::Error> for SinkError {
    fn from(e: io::Error) -> Self {
        SinkError::Io(e)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        SinkError::Encode(e)
    }
}

/// Destination of saved reports.
pub trait ReportSink: Send + Sync {
    fn submit(&self, report: &MemoryReport) -> Result<(), SinkError>;
}

/// Writes each report as pretty-printed JSON, replacing the file.
#[derive(Debug, Clone)]
pub struct JsonReportSink {
    path: PathBuf,
}

impl JsonReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for JsonReportSink {
    fn submit(&self, report: &MemoryReport) -> Result<(), SinkError> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        info!(path = %self.path.display(), ticks = report.ticks, "report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Unit;
    use tempfile::TempDir;

    fn sample_data() -> MemoryData {
        let mut data = MemoryData::default();
        let mem_free = data.linux.entry("MemFree".to_string()).or_default();
        mem_free.record(100000.0);
        mem_free.record(90000.0);
        data.bandwidth.record(12.5);
        data
    }

    #[test]
    fn test_json_sink_writes_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memory.json");
        let sink = JsonReportSink::new(&path);

        let report = MemoryReport::new(Platform::Amlogic, 2, sample_data());
        sink.submit(&report).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["platform"], "amlogic");
        assert_eq!(value["ticks"], 2);
        assert_eq!(value["data"]["linux"]["MemFree"]["count"], 2);
        assert_eq!(value["data"]["bandwidth"]["unit"], "percent");
        assert!(
            DateTime::parse_from_rfc3339(value["generated_at"].as_str().unwrap()).is_ok()
        );

        let parsed: MemoryReport = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.data.linux["MemFree"].snapshot().min, Some(90000.0));
        assert_eq!(parsed.data.bandwidth.unit(), Unit::Percent);
    }

    #[test]
    fn test_json_sink_missing_directory() {
        let dir = TempDir::new().unwrap();
        let sink = JsonReportSink::new(dir.path().join("absent").join("memory.json"));

        let report = MemoryReport::new(Platform::Unknown, 0, MemoryData::default());
        let err = sink.submit(&report).unwrap_err();
        assert!(matches!(err, SinkError::Io(_)));
    }
}

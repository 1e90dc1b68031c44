//! DRAM bandwidth utilisation from the Amlogic DDR bandwidth monitor.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::collector::platform::Platform;
use crate::collector::traits::FileSystem;
use crate::model::Measurement;

/// Records DRAM bandwidth utilisation in percent.
pub struct BandwidthCollector<F: FileSystem> {
    fs: F,
    /// `None` when the platform exposes no counters; fixed at construction.
    path: Option<PathBuf>,
}

impl<F: FileSystem> BandwidthCollector<F> {
    /// Probes the counters once; only Amlogic boxes with
    /// `<sys>/class/aml_ddr/bandwidth` are supported.
    pub fn new(fs: F, platform: Platform, sys_path: impl Into<PathBuf>) -> Self {
        let path = match platform {
            Platform::Amlogic => Some(sys_path.into().join("class/aml_ddr/bandwidth")),
            _ => None,
        }
        .filter(|p| fs.exists(p));

        if path.is_none() {
            debug!(%platform, "memory bandwidth counters not supported");
        }

        Self { fs, path }
    }

    pub fn is_supported(&self) -> bool {
        self.path.is_some()
    }

    /// Records the current usage percentage. No-op when unsupported; an
    /// unreadable or malformed counter skips this tick.
    pub fn collect(&self, bandwidth: &mut Measurement) {
        let Some(path) = &self.path else {
            return;
        };

        match self.fs.read_to_string(path).ok().as_deref().and_then(parse_usage_percent) {
            Some(usage) => bandwidth.record(usage),
            None => trace!(path = ?path, "bandwidth counter unreadable"),
        }
    }
}

/// Parses `Total bandwidth: 1843200 KB/s, usage: 23.41%` into `23.41`.
pub fn parse_usage_percent(content: &str) -> Option<f64> {
    let (_, rest) = content.split_once("usage:")?;
    rest.trim().trim_end_matches('%').trim().parse().ok()
}

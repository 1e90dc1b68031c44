//! Global memory accounting from `/proc/meminfo`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::trace;

use crate::collector::procfs::parser::parse_meminfo;
use crate::collector::traits::FileSystem;
use crate::model::{Measurement, Unit};

/// `/proc/meminfo` fields recorded every tick, all in kB.
pub const TRACKED_FIELDS: &[&str] = &[
    "MemTotal",
    "MemFree",
    "MemAvailable",
    "Buffers",
    "Cached",
    "SwapCached",
    "Active",
    "Inactive",
    "SwapTotal",
    "SwapFree",
    "Shmem",
    "Slab",
    "SReclaimable",
    "SUnreclaim",
    "KernelStack",
    "PageTables",
    "VmallocUsed",
    "CmaTotal",
    "CmaFree",
];

/// Samples `/proc/meminfo` into one measurement per tracked field.
pub struct LinuxMemoryCollector<F: FileSystem> {
    fs: F,
    meminfo_path: PathBuf,
}

impl<F: FileSystem> LinuxMemoryCollector<F> {
    pub fn new(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            meminfo_path: proc_path.into().join("meminfo"),
        }
    }

    /// Records every tracked field present in meminfo. Missing fields are
    /// left untouched rather than zero-filled.
    pub fn collect(&self, linux: &mut BTreeMap<String, Measurement>) {
        let Ok(content) = self.fs.read_to_string(&self.meminfo_path) else {
            trace!(path = ?self.meminfo_path, "meminfo unavailable");
            return;
        };

        for (key, value) in parse_meminfo(&content) {
            if !TRACKED_FIELDS.contains(&key) {
                continue;
            }
            linux
                .entry(key.to_string())
                .or_insert_with(|| Measurement::new(Unit::Kilobytes))
                .record(value as f64);
        }
    }
}

//! Broadcom reserved memory (bmem) pools.
//!
//! Source: `/proc/brcm/bmem`, a whitespace table whose header names the
//! columns, for example:
//!
//! ```text
//! name        base        size      used      free
//! bmem.0      0x20000000  393216    201728    191488
//! bmem.1      0x70000000  131072    4096      126976
//! ```
//!
//! Sizes are in KB. Column order is taken from the header; `free` is
//! optional and derived from `size - used` when absent.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, trace};

use crate::collector::platform::Platform;
use crate::collector::traits::FileSystem;
use crate::model::BmemRecord;

/// One parsed pool row; cells that failed to parse are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BmemPool {
    pub name: String,
    pub size_kb: Option<u64>,
    pub used_kb: Option<u64>,
    pub free_kb: Option<u64>,
}

/// Broadcom reserved-memory pool collector.
pub struct BmemCollector<F: FileSystem> {
    fs: F,
    path: Option<PathBuf>,
}

impl<F: FileSystem> BmemCollector<F> {
    pub fn new(fs: F, platform: Platform, proc_path: impl Into<PathBuf>) -> Self {
        let path = (platform == Platform::Broadcom)
            .then(|| proc_path.into().join("brcm/bmem"))
            .filter(|p| fs.exists(p));

        if path.is_none() {
            debug!(%platform, "bmem accounting not available");
        }

        Self { fs, path }
    }

    pub fn is_supported(&self) -> bool {
        self.path.is_some()
    }

    /// Updates one record per pool row. Cells that fail to parse are
    /// skipped individually; the rest of the row is still recorded.
    pub fn collect(&self, bmem: &mut BTreeMap<String, BmemRecord>) {
        let Some(path) = &self.path else {
            return;
        };
        let Ok(content) = self.fs.read_to_string(path) else {
            trace!(path = ?path, "bmem table unreadable");
            return;
        };

        for pool in parse_bmem(&content) {
            let free_kb = pool.free_kb.or_else(|| {
                let (size, used) = (pool.size_kb?, pool.used_kb?);
                Some(size.saturating_sub(used))
            });

            let record = bmem
                .entry(pool.name)
                .or_insert_with(|| BmemRecord::new(pool.size_kb.unwrap_or(0)));
            if record.size_kb == 0
                && let Some(size_kb) = pool.size_kb
            {
                record.size_kb = size_kb;
            }
            if let Some(used_kb) = pool.used_kb {
                record.used.record(used_kb as f64);
            }
            if let Some(free_kb) = free_kb {
                record.free.record(free_kb as f64);
            }
        }
    }
}

/// Parses the bmem table, locating columns by the header names.
pub fn parse_bmem(content: &str) -> Vec<BmemPool> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };

    let columns: Vec<String> = header
        .split_whitespace()
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let position = |name: &str| columns.iter().position(|c| c == name);
    let Some(name_col) = position("name") else {
        return Vec::new();
    };
    let size_col = position("size");
    let used_col = position("used");
    let free_col = position("free");

    lines
        .filter_map(|line| {
            let cells: Vec<&str> = line.split_whitespace().collect();
            let cell = |col: Option<usize>| -> Option<u64> { cells.get(col?)?.parse().ok() };
            Some(BmemPool {
                name: cells.get(name_col)?.to_string(),
                size_kb: cell(size_col),
                used_kb: cell(used_col),
                free_kb: cell(free_col),
            })
        })
        .collect()
}

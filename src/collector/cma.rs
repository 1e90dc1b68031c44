//! Contiguous Memory Allocator areas from debugfs.
//!
//! Each area lives in `<debugfs>/cma/<name>/` with `count` (area size in
//! pages) and `used` (pages allocated through `cma_alloc`).

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, trace};

use crate::collector::procfs::parser::meminfo_field;
use crate::collector::traits::FileSystem;
use crate::model::{CmaRecord, MemoryData};

/// Logical area name -> kernel directory name under `<debugfs>/cma`.
pub type CmaNameTable = BTreeMap<String, String>;

/// Collector of per-area CMA usage and the CMA-wide rollups.
pub struct CmaCollector<F: FileSystem> {
    fs: F,
    cma_root: PathBuf,
    meminfo_path: PathBuf,
    page_size: u64,
    names: CmaNameTable,
    /// Capacity in KB, read once per area.
    capacities: BTreeMap<String, u64>,
}

impl<F: FileSystem> CmaCollector<F> {
    /// Creates the collector.
    ///
    /// With `names == None` the table is built from the directories found
    /// under `<debugfs>/cma` right now; it does not change afterwards.
    pub fn new(
        fs: F,
        debugfs_path: impl Into<PathBuf>,
        proc_path: impl Into<PathBuf>,
        page_size: u64,
        names: Option<CmaNameTable>,
    ) -> Self {
        let cma_root = debugfs_path.into().join("cma");
        let names = names.unwrap_or_else(|| discover_areas(&fs, &cma_root));
        debug!(areas = names.len(), "CMA name table ready");

        let mut collector = Self {
            fs,
            cma_root,
            meminfo_path: proc_path.into().join("meminfo"),
            page_size,
            names,
            capacities: BTreeMap::new(),
        };

        let logical: Vec<String> = collector.names.keys().cloned().collect();
        for name in logical {
            if let Some(size_kb) = collector.read_capacity(&name) {
                collector.capacities.insert(name, size_kb);
            }
        }

        collector
    }

    /// The immutable logical-to-kernel name table.
    pub fn names(&self) -> &CmaNameTable {
        &self.names
    }

    /// Samples every area in the name table and updates the rollups.
    ///
    /// # Arguments
    /// * `data` - Receives per-area records in `data.cma` and the
    ///   `cma_free` / `cma_borrowed` rollups
    ///
    /// Areas whose `used` attribute cannot be read are skipped and keep
    /// their previous record. Rollups are only recorded when at least one
    /// area was observed; `cma_borrowed` additionally needs `CmaFree` in
    /// meminfo.
    pub fn collect(&mut self, data: &mut MemoryData) {
        let mut observed = 0usize;
        let mut total_unused_kb = 0u64;

        let logical: Vec<String> = self.names.keys().cloned().collect();
        for name in logical {
            let Some(used_kb) = self.read_pages(&name, "used").and_then(|p| self.pages_to_kb(p))
            else {
                trace!(area = %name, "CMA area not reported this tick");
                continue;
            };

            let size_kb = match self.capacities.get(&name) {
                Some(&size_kb) => size_kb,
                None => {
                    let Some(size_kb) = self.read_capacity(&name) else {
                        continue;
                    };
                    self.capacities.insert(name.clone(), size_kb);
                    size_kb
                }
            };

            let unused_kb = size_kb.saturating_sub(used_kb);
            let record = data
                .cma
                .entry(name)
                .or_insert_with(|| CmaRecord::new(size_kb));
            record.used.record(used_kb as f64);
            record.unused.record(unused_kb as f64);

            observed += 1;
            total_unused_kb = total_unused_kb.saturating_add(unused_kb);
        }

        if observed == 0 {
            return;
        }

        data.cma_free.record(total_unused_kb as f64);

        let buddy_free_kb = self
            .fs
            .read_to_string(&self.meminfo_path)
            .ok()
            .and_then(|content| meminfo_field(&content, "CmaFree"));
        if let Some(buddy_free_kb) = buddy_free_kb {
            data.cma_borrowed
                .record(total_unused_kb.saturating_sub(buddy_free_kb) as f64);
        }
    }

    fn read_capacity(&self, name: &str) -> Option<u64> {
        self.read_pages(name, "count").and_then(|p| self.pages_to_kb(p))
    }

    fn read_pages(&self, name: &str, attr: &str) -> Option<u64> {
        let kernel_name = self.names.get(name)?;
        self.fs
            .read_u64(&self.cma_root.join(kernel_name).join(attr))
            .ok()
    }

    /// `None` when the byte size does not fit in a `u64`.
    fn pages_to_kb(&self, pages: u64) -> Option<u64> {
        pages.checked_mul(self.page_size).map(|bytes| bytes / 1024)
    }
}

fn discover_areas<F: FileSystem>(fs: &F, cma_root: &std::path::Path) -> CmaNameTable {
    let Ok(entries) = fs.read_dir(cma_root) else {
        debug!(path = ?cma_root, "no CMA debugfs interface");
        return CmaNameTable::new();
    };

    entries
        .iter()
        .filter_map(|p| p.file_name()?.to_str().map(str::to_string))
        .map(|name| (name.clone(), name))
        .collect()
}

//! Per-subsystem records that embed [`Measurement`]s.
//!
//! Every record is created lazily by its owning collector on the first
//! observation of an entity and mutated only on the collection thread.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::measurement::{Measurement, Unit};

/// One named CMA area.
///
/// Source: `<debugfs>/cma/<area>/{count,used}`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct CmaRecord {
    /// Capacity of the area in KB, fixed for the session.
    pub size_kb: u64,
    /// KB allocated through `cma_alloc`.
    pub used: Measurement,
    /// KB not allocated through `cma_alloc`.
    pub unused: Measurement,
}

impl CmaRecord {
    pub fn new(size_kb: u64) -> Self {
        Self {
            size_kb,
            used: Measurement::new(Unit::Kilobytes),
            unused: Measurement::new(Unit::Kilobytes),
        }
    }
}

/// Free pages and fragmentation index for one buddy order.
///
/// Source: `/proc/buddyinfo`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct FragmentationEntry {
    /// Free pages held in blocks of this order (`blocks * 2^order`).
    pub free_pages: Measurement,
    /// Unusable free space index for this order, percent.
    pub fragmentation: Measurement,
}

impl Default for FragmentationEntry {
    fn default() -> Self {
        Self {
            free_pages: Measurement::new(Unit::Pages),
            fragmentation: Measurement::new(Unit::Percent),
        }
    }
}

/// Identity of a process as captured on first sighting.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cmdline: String,
}

impl ProcessInfo {
    /// Identity used when the process source has nothing for `pid`.
    pub fn unknown(pid: u32) -> Self {
        Self {
            pid,
            ..Self::default()
        }
    }
}

/// GPU memory attributed to one process, summed over its threads.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct GpuRecord {
    pub process: ProcessInfo,
    /// Bytes per contributing allocation entry.
    pub used: Measurement,
}

impl GpuRecord {
    pub fn new(process: ProcessInfo) -> Self {
        Self {
            process,
            used: Measurement::new(Unit::Bytes),
        }
    }
}

/// Memory accounting of one container cgroup, all values in KB.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ContainerRecord {
    pub usage: Measurement,
    pub limit: Measurement,
    pub cache: Measurement,
    pub rss: Measurement,
    pub swap: Measurement,
}

impl Default for ContainerRecord {
    fn default() -> Self {
        Self {
            usage: Measurement::new(Unit::Kilobytes),
            limit: Measurement::new(Unit::Kilobytes),
            cache: Measurement::new(Unit::Kilobytes),
            rss: Measurement::new(Unit::Kilobytes),
            swap: Measurement::new(Unit::Kilobytes),
        }
    }
}

/// One vendor reserved-memory (bmem) pool.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct BmemRecord {
    pub size_kb: u64,
    pub used: Measurement,
    pub free: Measurement,
}

impl BmemRecord {
    pub fn new(size_kb: u64) -> Self {
        Self {
            size_kb,
            used: Measurement::new(Unit::Kilobytes),
            free: Measurement::new(Unit::Kilobytes),
        }
    }
}

/// Statistics of one zram block device.
///
/// Source: `/sys/block/zramN/mm_stat`, `/sys/block/zramN/max_comp_streams`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ZramRecord {
    /// Uncompressed size of stored data (KB).
    pub uncompressed_size: Measurement,
    /// Compressed size of stored data (KB).
    pub compressed_size: Measurement,
    /// System memory actually consumed by the device (KB).
    pub sys_mem_used: Measurement,
    /// Objects migrated by compaction.
    pub migrated: Measurement,
    /// Fragmentation plus allocator metadata overhead (KB).
    pub total_fragmentation: Measurement,
    /// Pages holding only a repeated value, no memory allocated.
    pub zero_pages: Measurement,
    pub concurrent_compress_ops: Measurement,
}

impl Default for ZramRecord {
    fn default() -> Self {
        Self {
            uncompressed_size: Measurement::new(Unit::Kilobytes),
            compressed_size: Measurement::new(Unit::Kilobytes),
            sys_mem_used: Measurement::new(Unit::Kilobytes),
            migrated: Measurement::new(Unit::Count),
            total_fragmentation: Measurement::new(Unit::Kilobytes),
            zero_pages: Measurement::new(Unit::Pages),
            concurrent_compress_ops: Measurement::new(Unit::Count),
        }
    }
}

/// Everything accumulated during one collection session.
///
/// All maps are ordered so that a report renders identically for identical
/// data.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct MemoryData {
    /// `/proc/meminfo` field name -> KB.
    pub linux: BTreeMap<String, Measurement>,
    pub cma: BTreeMap<String, CmaRecord>,
    pub cma_free: Measurement,
    pub cma_borrowed: Measurement,
    pub gpu: BTreeMap<u32, GpuRecord>,
    pub containers: BTreeMap<String, ContainerRecord>,
    pub bandwidth: Measurement,
    pub bmem: BTreeMap<String, BmemRecord>,
    /// Zone -> entries indexed by buddy order.
    pub fragmentation: BTreeMap<String, Vec<FragmentationEntry>>,
    pub zram: BTreeMap<String, ZramRecord>,
}

impl Default for MemoryData {
    fn default() -> Self {
        Self {
            linux: BTreeMap::new(),
            cma: BTreeMap::new(),
            cma_free: Measurement::new(Unit::Kilobytes),
            cma_borrowed: Measurement::new(Unit::Kilobytes),
            gpu: BTreeMap::new(),
            containers: BTreeMap::new(),
            bandwidth: Measurement::new(Unit::Percent),
            bmem: BTreeMap::new(),
            fragmentation: BTreeMap::new(),
            zram: BTreeMap::new(),
        }
    }
}

impl MemoryData {
    /// Returns `true` when no collector has stored anything yet.
    pub fn is_empty(&self) -> bool {
        self.linux.is_empty()
            && self.cma.is_empty()
            && self.cma_free.is_empty()
            && self.cma_borrowed.is_empty()
            && self.gpu.is_empty()
            && self.containers.is_empty()
            && self.bandwidth.is_empty()
            && self.bmem.is_empty()
            && self.fragmentation.is_empty()
            && self.zram.is_empty()
    }

    /// Drops every record, used when a new session starts.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_data_is_empty() {
        let data = MemoryData::default();
        assert!(data.is_empty());
        assert_eq!(data.bandwidth.unit(), Unit::Percent);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut data = MemoryData::default();
        data.linux
            .entry("MemFree".to_string())
            .or_default()
            .record(1.0);
        data.cma_free.record(5.0);
        data.fragmentation
            .entry("Normal".to_string())
            .or_default()
            .push(FragmentationEntry::default());
        assert!(!data.is_empty());

        data.clear();
        assert!(data.is_empty());
    }
}

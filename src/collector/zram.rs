//! zram compressed block device statistics.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::collector::procfs::ParseError;
use crate::collector::traits::FileSystem;
use crate::model::{ZramRecord, bytes_to_kb};

/// Parsed `/sys/block/zramN/mm_stat`.
///
/// Sizes are bytes, counts are pages/objects as the kernel reports them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MmStat {
    pub orig_data_size: u64,
    pub compr_data_size: u64,
    pub mem_used_total: u64,
    pub mem_limit: u64,
    pub mem_used_max: u64,
    /// `same_pages` (`zero_pages` on kernels before 4.11).
    pub same_pages: u64,
    pub pages_compacted: u64,
    /// Absent before 4.19.
    pub huge_pages: Option<u64>,
}

/// Parses the whitespace separated `mm_stat` columns.
pub fn parse_mm_stat(content: &str) -> Result<MmStat, ParseError> {
    let fields: Vec<u64> = content
        .split_whitespace()
        .map(|s| {
            s.parse()
                .map_err(|_| ParseError::new(format!("invalid mm_stat column {:?}", s)))
        })
        .collect::<Result<_, _>>()?;

    if fields.len() < 7 {
        return Err(ParseError::new(format!(
            "not enough fields in mm_stat: expected 7+, got {}",
            fields.len()
        )));
    }

    Ok(MmStat {
        orig_data_size: fields[0],
        compr_data_size: fields[1],
        mem_used_total: fields[2],
        mem_limit: fields[3],
        mem_used_max: fields[4],
        same_pages: fields[5],
        pages_compacted: fields[6],
        huge_pages: fields.get(7).copied(),
    })
}

/// Per-device zram statistics collector.
pub struct ZramCollector<F: FileSystem> {
    fs: F,
    block_root: PathBuf,
    enabled: bool,
}

impl<F: FileSystem> ZramCollector<F> {
    /// zram is collected only when requested and the kernel has the driver
    /// loaded (`zram0` or the hot-add control class exists).
    pub fn new(fs: F, sys_path: impl Into<PathBuf>, requested: bool) -> Self {
        let sys_path = sys_path.into();
        let block_root = sys_path.join("block");
        let present =
            fs.exists(&block_root.join("zram0")) || fs.exists(&sys_path.join("class/zram-control"));
        let enabled = requested && present;

        if requested && !present {
            debug!("zram requested but no zram device present");
        }

        Self {
            fs,
            block_root,
            enabled,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.enabled
    }

    /// Records every `zram*` block device that has an `mm_stat`.
    ///
    /// # Arguments
    /// * `zram` - Records keyed by device name (`zram0`, `zram1`, ...)
    pub fn collect(&self, zram: &mut BTreeMap<String, ZramRecord>) {
        if !self.enabled {
            return;
        }
        let Ok(entries) = self.fs.read_dir(&self.block_root) else {
            return;
        };

        for device in entries {
            let Some(name) = device.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with("zram") {
                continue;
            }
            self.collect_device(name, &device, zram);
        }
    }

    fn collect_device(&self, name: &str, device: &Path, zram: &mut BTreeMap<String, ZramRecord>) {
        let mm_stat = match self
            .fs
            .read_to_string(&device.join("mm_stat"))
            .map_err(|e| e.to_string())
            .and_then(|c| parse_mm_stat(&c).map_err(|e| e.to_string()))
        {
            Ok(stat) => stat,
            Err(e) => {
                trace!(device = name, error = %e, "skipping zram device");
                return;
            }
        };

        let record = zram.entry(name.to_string()).or_default();
        record.uncompressed_size.record(bytes_to_kb(mm_stat.orig_data_size));
        record.compressed_size.record(bytes_to_kb(mm_stat.compr_data_size));
        record.sys_mem_used.record(bytes_to_kb(mm_stat.mem_used_total));
        record.migrated.record(mm_stat.pages_compacted as f64);
        record.total_fragmentation.record(bytes_to_kb(
            mm_stat.mem_used_total.saturating_sub(mm_stat.compr_data_size),
        ));
        record.zero_pages.record(mm_stat.same_pages as f64);

        if let Ok(streams) = self.fs.read_u64(&device.join("max_comp_streams")) {
            record.concurrent_compress_ops.record(streams as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MockFs;

    const MM_STAT: &str = "  4194304  1048576  1179648        0  1310720      12       3        5\n";

    fn zram_fs() -> MockFs {
        let mut fs = MockFs::new();
        fs.add_file("/sys/block/zram0/mm_stat", MM_STAT);
        fs.add_file("/sys/block/zram0/max_comp_streams", "4\n");
        fs.add_file("/sys/block/mmcblk0/size", "30535680\n");
        fs
    }

    #[test]
    fn test_parse_mm_stat() {
        let stat = parse_mm_stat(MM_STAT).unwrap();
        assert_eq!(stat.orig_data_size, 4194304);
        assert_eq!(stat.compr_data_size, 1048576);
        assert_eq!(stat.mem_used_total, 1179648);
        assert_eq!(stat.same_pages, 12);
        assert_eq!(stat.pages_compacted, 3);
        assert_eq!(stat.huge_pages, Some(5));
    }

    #[test]
    fn test_parse_mm_stat_old_kernel() {
        let stat = parse_mm_stat("100 50 60 0 70 1 2").unwrap();
        assert_eq!(stat.huge_pages, None);
        assert!(parse_mm_stat("100 50 60").is_err());
        assert!(parse_mm_stat("100 50 60 0 70 x 2").is_err());
    }

    #[test]
    fn test_collect_zram_device() {
        let collector = ZramCollector::new(zram_fs(), "/sys", true);
        assert!(collector.is_supported());

        let mut zram = BTreeMap::new();
        collector.collect(&mut zram);

        assert_eq!(zram.len(), 1);
        let dev = &zram["zram0"];
        assert_eq!(dev.uncompressed_size.snapshot().last, Some(4096.0));
        assert_eq!(dev.compressed_size.snapshot().last, Some(1024.0));
        assert_eq!(dev.sys_mem_used.snapshot().last, Some(1152.0));
        assert_eq!(dev.total_fragmentation.snapshot().last, Some(128.0));
        assert_eq!(dev.migrated.snapshot().last, Some(3.0));
        assert_eq!(dev.zero_pages.snapshot().last, Some(12.0));
        assert_eq!(dev.concurrent_compress_ops.snapshot().last, Some(4.0));
    }

    #[test]
    fn test_zram_not_requested() {
        let collector = ZramCollector::new(zram_fs(), "/sys", false);
        let mut zram = BTreeMap::new();
        collector.collect(&mut zram);
        assert!(zram.is_empty());
    }

    #[test]
    fn test_zram_requested_but_absent() {
        let collector = ZramCollector::new(MockFs::new(), "/sys", true);
        assert!(!collector.is_supported());
    }

    #[test]
    fn test_unconfigured_device_is_skipped() {
        let mut fs = zram_fs();
        fs.add_file("/sys/block/zram1/disksize", "0\n");
        let collector = ZramCollector::new(fs, "/sys", true);

        let mut zram = BTreeMap::new();
        collector.collect(&mut zram);
        assert!(!zram.contains_key("zram1"));
    }
}

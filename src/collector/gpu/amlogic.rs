//! Mali `gpu_memory` debugfs file, as found on Amlogic SoCs.

use std::path::{Path, PathBuf};

use crate::collector::traits::FileSystem;

use super::{GpuAllocation, GpuBackend};

/// Reads `<debugfs>/mali0/gpu_memory`.
///
/// ```text
/// mali0                  45231
///   kctx-0xffffffc05e8e0000       3211       1534       1540
/// ```
///
/// The device line carries the total page count. Each `kctx` line is one GPU
/// context: used pages, tgid and, on newer drivers, the pid of the thread that
/// opened it. That thread id is preferred when present.
pub struct MaliGpuMemory<F: FileSystem> {
    fs: F,
    path: PathBuf,
    page_size: u64,
}

impl<F: FileSystem> MaliGpuMemory<F> {
    pub fn new(fs: F, debugfs_path: &Path, page_size: u64) -> Self {
        Self {
            fs,
            path: debugfs_path.join("mali0").join("gpu_memory"),
            page_size,
        }
    }
}

impl<F: FileSystem> GpuBackend for MaliGpuMemory<F> {
    fn name(&self) -> &'static str {
        "mali-gpu-memory"
    }

    fn is_available(&self) -> bool {
        self.fs.exists(&self.path)
    }

    fn read_allocations(&self) -> Vec<GpuAllocation> {
        self.fs
            .read_to_string(&self.path)
            .map(|content| parse_gpu_memory(&content, self.page_size))
            .unwrap_or_default()
    }
}

pub(crate) fn parse_gpu_memory(content: &str, page_size: u64) -> Vec<GpuAllocation> {
    let mut allocs = Vec::new();

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        if !parts.next().is_some_and(|ctx| ctx.starts_with("kctx")) {
            continue;
        }

        let numbers: Vec<u64> = parts.map_while(|s| s.parse().ok()).collect();
        let (pages, tid) = match numbers.as_slice() {
            [pages, _tgid, pid, ..] => (*pages, *pid),
            [pages, tgid] => (*pages, *tgid),
            _ => continue,
        };
        let Ok(tid) = u32::try_from(tid) else {
            continue;
        };
        let Some(bytes) = pages.checked_mul(page_size) else {
            continue;
        };

        allocs.push(GpuAllocation { tid, bytes });
    }

    allocs
}

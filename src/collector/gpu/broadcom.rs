//! Broadcom V3D client memory table.

use std::path::{Path, PathBuf};

use crate::collector::traits::FileSystem;

use super::{GpuAllocation, GpuBackend};

/// Reads `<debugfs>/v3d/client_mem`.
///
/// Format: one header line, then `<tid> <name> <bytes>` per client thread.
/// Thread names may contain spaces, so bytes are taken from the last column.
pub struct V3dClientMem<F: FileSystem> {
    fs: F,
    path: PathBuf,
}

impl<F: FileSystem> V3dClientMem<F> {
    pub fn new(fs: F, debugfs_path: &Path) -> Self {
        Self {
            fs,
            path: debugfs_path.join("v3d").join("client_mem"),
        }
    }
}

impl<F: FileSystem> GpuBackend for V3dClientMem<F> {
    fn name(&self) -> &'static str {
        "broadcom-v3d"
    }

    fn is_available(&self) -> bool {
        self.fs.exists(&self.path)
    }

    fn read_allocations(&self) -> Vec<GpuAllocation> {
        self.fs
            .read_to_string(&self.path)
            .map(|content| parse_client_mem(&content))
            .unwrap_or_default()
    }
}

pub(crate) fn parse_client_mem(content: &str) -> Vec<GpuAllocation> {
    content
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                return None;
            }
            let tid = parts[0].parse().ok()?;
            let bytes = parts[parts.len() - 1].parse().ok()?;
            Some(GpuAllocation { tid, bytes })
        })
        .collect()
}

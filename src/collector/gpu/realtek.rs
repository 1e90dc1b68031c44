//! Per-context Mali memory profiles, as exposed by Realtek kernels.

use std::path::{Path, PathBuf};

use crate::collector::traits::FileSystem;

use super::{GpuAllocation, GpuBackend};

const TOTAL_PREFIX: &str = "Total allocated memory:";

/// Walks `<debugfs>/mali/ctx/<tid>_<ctx>/mem_profile`.
///
/// Every context directory is named after the thread that created it; its
/// `mem_profile` ends with a `Total allocated memory: <bytes>` line.
pub struct MaliContextProfiles<F: FileSystem> {
    fs: F,
    ctx_root: PathBuf,
}

impl<F: FileSystem> MaliContextProfiles<F> {
    pub fn new(fs: F, debugfs_path: &Path) -> Self {
        Self {
            fs,
            ctx_root: debugfs_path.join("mali").join("ctx"),
        }
    }
}

impl<F: FileSystem> GpuBackend for MaliContextProfiles<F> {
    fn name(&self) -> &'static str {
        "mali-ctx-profile"
    }

    fn is_available(&self) -> bool {
        self.fs.exists(&self.ctx_root)
    }

    fn read_allocations(&self) -> Vec<GpuAllocation> {
        let Ok(mut contexts) = self.fs.read_dir(&self.ctx_root) else {
            return Vec::new();
        };
        contexts.sort();

        contexts
            .iter()
            .filter_map(|dir| {
                let tid = dir.file_name()?.to_str().and_then(context_tid)?;
                let profile = self.fs.read_to_string(&dir.join("mem_profile")).ok()?;
                let bytes = parse_total_allocated(&profile)?;
                Some(GpuAllocation { tid, bytes })
            })
            .collect()
    }
}

/// `"1534_2"` -> `1534`.
fn context_tid(dir_name: &str) -> Option<u32> {
    dir_name.split_once('_')?.0.parse().ok()
}

pub(crate) fn parse_total_allocated(content: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        line.trim()
            .strip_prefix(TOTAL_PREFIX)
            .and_then(|v| v.trim().parse().ok())
    })
}

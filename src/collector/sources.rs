//! Collaborators that feed the collectors with metadata they do not own:
//! process identities for GPU records and the set of containers to watch.

use std::path::PathBuf;

use crate::collector::traits::FileSystem;
use crate::model::ProcessInfo;

/// Supplies identity for a process id.
///
/// Returning `None` never aborts collection; callers fall back to an
/// anonymous identity.
pub trait ProcessInfoSource: Send {
    fn process(&self, pid: u32) -> Option<ProcessInfo>;
}

/// Reads `/proc/[pid]/comm` and `/proc/[pid]/cmdline`.
pub struct ProcfsProcessSource<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
}

impl<F: FileSystem> ProcfsProcessSource<F> {
    pub fn new(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }
}

impl<F: FileSystem> ProcessInfoSource for ProcfsProcessSource<F> {
    fn process(&self, pid: u32) -> Option<ProcessInfo> {
        let base = self.proc_path.join(pid.to_string());
        let name = self.fs.read_to_string(&base.join("comm")).ok()?;

        // Kernel threads have an empty cmdline.
        let cmdline = self
            .fs
            .read_to_string(&base.join("cmdline"))
            .map(|c| c.replace('\0', " ").trim().to_string())
            .unwrap_or_default();

        Some(ProcessInfo {
            pid,
            name: name.trim().to_string(),
            cmdline,
        })
    }
}

/// A container whose memory is watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    /// cgroup directory holding the container's memory controller files.
    pub cgroup_path: PathBuf,
}

impl Container {
    pub fn new(id: impl Into<String>, cgroup_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            cgroup_path: cgroup_path.into(),
        }
    }
}

/// Supplies the containers to monitor. Queried once per tick so the set
/// may change while collection runs.
pub trait ContainerSource: Send {
    fn containers(&self) -> Vec<Container>;
}

/// A fixed container list.
#[derive(Debug, Clone, Default)]
pub struct StaticContainers(pub Vec<Container>);

impl ContainerSource for StaticContainers {
    fn containers(&self) -> Vec<Container> {
        self.0.clone()
    }
}

/// Treats every sub-directory of a parent cgroup as one container named
/// after the directory (e.g. `/sys/fs/cgroup/lxc/<id>`).
pub struct CgroupDirContainers<F: FileSystem> {
    fs: F,
    parent: PathBuf,
}

impl<F: FileSystem> CgroupDirContainers<F> {
    pub fn new(fs: F, parent: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            parent: parent.into(),
        }
    }
}

impl<F: FileSystem> ContainerSource for CgroupDirContainers<F> {
    fn containers(&self) -> Vec<Container> {
        let Ok(entries) = self.fs.read_dir(&self.parent) else {
            return Vec::new();
        };

        let mut containers: Vec<Container> = entries
            .into_iter()
            .filter(|p| is_cgroup_dir(&self.fs, p))
            .filter_map(|p| {
                let id = p.file_name()?.to_str()?.to_string();
                Some(Container::new(id, p))
            })
            .collect();
        containers.sort_by(|a, b| a.id.cmp(&b.id));
        containers
    }
}

fn is_cgroup_dir<F: FileSystem>(fs: &F, path: &std::path::Path) -> bool {
    fs.exists(&path.join("memory.current")) || fs.exists(&path.join("memory.usage_in_bytes"))
}

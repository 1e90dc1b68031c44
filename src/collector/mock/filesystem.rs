//! In-memory filesystem for testing collectors without real kernel files.

use crate::collector::traits::FileSystem;
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Tree {
    files: HashMap<PathBuf, String>,
    directories: BTreeSet<PathBuf>,
}

impl Tree {
    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }
}

/// In-memory filesystem for testing.
///
/// Stores files and directories in memory so tests can describe `/proc`,
/// `/sys` and debugfs states. Clones share the same tree: a test keeps one
/// handle and changes kernel state between ticks while collectors hold the
/// others.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    tree: Arc<RwLock<Tree>>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a file. Parent directories are created.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        let mut tree = self.write();
        tree.add_parents(&path);
        tree.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut tree = self.write();
        tree.add_parents(&path);
        tree.directories.insert(path);
    }

    /// Removes a file, or a directory together with everything below it.
    pub fn remove(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut tree = self.write();
        tree.files.retain(|p, _| !p.starts_with(path));
        tree.directories.retain(|p| !p.starts_with(path));
    }

    /// Adds `/proc/<pid>` with `comm`, `cmdline` and a `status` naming `pid`
    /// as its own thread-group leader.
    pub fn add_process(&mut self, pid: u32, comm: &str, cmdline: &str) {
        self.add_thread(pid, pid, comm);
        let base = PathBuf::from(format!("/proc/{}", pid));
        self.add_file(base.join("comm"), format!("{}\n", comm));
        self.add_file(base.join("cmdline"), cmdline.replace(' ', "\0"));
    }

    /// Adds `/proc/<tid>/status` for a thread belonging to `tgid`.
    pub fn add_thread(&mut self, tid: u32, tgid: u32, comm: &str) {
        self.add_file(
            format!("/proc/{}/status", tid),
            format!(
                "Name:\t{}\nUmask:\t0022\nState:\tS (sleeping)\nTgid:\t{}\nNgid:\t0\nPid:\t{}\nPPid:\t1\n",
                comm, tgid, tid
            ),
        );
    }

    fn read(&self) -> RwLockReadGuard<'_, Tree> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tree> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.read().files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        let tree = self.read();
        tree.files.contains_key(path) || tree.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let tree = self.read();
        if !tree.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", path),
            ));
        }

        let mut entries = BTreeSet::new();

        for file_path in tree.files.keys() {
            if file_path.parent().is_some_and(|parent| parent == path) {
                entries.insert(file_path.clone());
            }
        }

        for dir_path in &tree.directories {
            if dir_path.parent().is_some_and(|parent| parent == path) && dir_path != path {
                entries.insert(dir_path.clone());
            }
        }

        Ok(entries.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_fs_add_file() {
        let mut fs = MockFs::new();
        fs.add_file("/sys/kernel/debug/cma/cma-0/count", "16384\n");

        assert!(fs.exists(Path::new("/sys/kernel/debug/cma/cma-0")));
        assert!(fs.exists(Path::new("/sys/kernel/debug/cma")));
        assert_eq!(
            fs.read_u64(Path::new("/sys/kernel/debug/cma/cma-0/count"))
                .unwrap(),
            16384
        );
    }

    #[test]
    fn test_mock_fs_read_dir() {
        let mut fs = MockFs::new();
        fs.add_file("/sys/block/zram0/mm_stat", "0 0 0 0 0 0 0");
        fs.add_file("/sys/block/zram1/mm_stat", "0 0 0 0 0 0 0");
        fs.add_file("/sys/block/mmcblk0/size", "1024");

        let entries = fs.read_dir(Path::new("/sys/block")).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], PathBuf::from("/sys/block/mmcblk0"));
    }

    #[test]
    fn test_mock_fs_remove_subtree() {
        let mut fs = MockFs::new();
        fs.add_file("/sys/kernel/debug/cma/video/count", "100");
        fs.add_file("/sys/kernel/debug/cma/video/used", "10");
        fs.add_file("/sys/kernel/debug/cma/audio/count", "100");

        fs.remove("/sys/kernel/debug/cma/video");

        assert!(!fs.exists(Path::new("/sys/kernel/debug/cma/video")));
        assert!(!fs.exists(Path::new("/sys/kernel/debug/cma/video/used")));
        assert!(fs.exists(Path::new("/sys/kernel/debug/cma/audio/count")));
    }

    #[test]
    fn test_mock_fs_add_thread() {
        let mut fs = MockFs::new();
        fs.add_process(100, "westeros", "/usr/bin/westeros --renderer");
        fs.add_thread(105, 100, "wst-render");

        let status = fs.read_to_string(Path::new("/proc/105/status")).unwrap();
        assert!(status.contains("Tgid:\t100"));
        let cmdline = fs.read_to_string(Path::new("/proc/100/cmdline")).unwrap();
        assert_eq!(cmdline, "/usr/bin/westeros\0--renderer");
    }

    #[test]
    fn test_mock_fs_clones_share_tree() {
        let mut handle = MockFs::new();
        let collector_view = handle.clone();
        handle.add_file("/proc/buddyinfo", "Node 0, zone Normal 1");

        assert!(collector_view.exists(Path::new("/proc/buddyinfo")));
        handle.remove("/proc/buddyinfo");
        assert!(!collector_view.exists(Path::new("/proc/buddyinfo")));
    }

    #[test]
    fn test_mock_fs_file_not_found() {
        let fs = MockFs::new();
        let err = fs.read_to_string(Path::new("/proc/meminfo")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

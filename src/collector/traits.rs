//! Filesystem abstraction over the kernel pseudo-files the collectors read.
//!
//! Every collector goes through `FileSystem` so that `/proc`, `/sys` and
//! debugfs can be replaced by `MockFs` in tests.

use std::io;
use std::path::{Path, PathBuf};

/// Read-only access to kernel pseudo-files.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    ///
    /// # Arguments
    /// * `path` - Path to the file to read
    ///
    /// # Returns
    /// The file contents, or an I/O error if the file cannot be read
    /// (for example because the entity it describes went away).
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    ///
    /// Used once at construction for feature detection of optional
    /// interfaces (debugfs GPU tables, bandwidth counters, zram).
    fn exists(&self, path: &Path) -> bool;

    /// Lists entries in a directory.
    ///
    /// # Arguments
    /// * `path` - Path to the directory
    ///
    /// # Returns
    /// Full paths of the entries, in no particular order, or an I/O error.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Reads a single-value sysfs/debugfs attribute as an unsigned integer.
    ///
    /// # Returns
    /// The parsed value, or `InvalidData` when the trimmed content is not an
    /// integer.
    fn read_u64(&self, path: &Path) -> io::Result<u64> {
        let content = self.read_to_string(path)?;
        content.trim().parse().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("not an integer in {:?}: {:?}", path, content.trim()),
            )
        })
    }
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    /// Creates a new real filesystem accessor.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }
}

//! Thread id to owning process id resolution.

use std::path::PathBuf;

use crate::collector::traits::FileSystem;

use super::parser::parse_status_tgid;

/// Error returned when a thread cannot be mapped to its process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The thread exited between enumeration and resolution.
    NotFound(u32),
    /// The status file exists but carries no usable `Tgid`.
    Malformed(u32),
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::NotFound(tid) => write!(f, "thread {} not found", tid),
            ResolveError::Malformed(tid) => write!(f, "thread {} has no valid Tgid", tid),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Resolves thread ids to the pid of their thread group via
/// `/proc/[tid]/status`.
///
/// `/proc/[tid]` is reachable for every live thread even though only
/// thread-group leaders are listed by `readdir(/proc)`.
pub struct PidResolver<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
}

impl<F: FileSystem> PidResolver<F> {
    pub fn new(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    pub fn resolve(&self, tid: u32) -> Result<u32, ResolveError> {
        let status_path = self.proc_path.join(tid.to_string()).join("status");
        let content = self
            .fs
            .read_to_string(&status_path)
            .map_err(|_| ResolveError::NotFound(tid))?;
        parse_status_tgid(&content).map_err(|_| ResolveError::Malformed(tid))
    }
}

//! GPU memory per process.
//!
//! Vendor interfaces report allocations per thread (or per GPU context
//! opened by a thread). Each backend turns its interface into a flat list
//! of [`GpuAllocation`]s; the collector resolves every thread to its owning
//! process and accumulates into one record per pid.

mod amlogic;
mod broadcom;
mod realtek;

pub use amlogic::MaliGpuMemory;
pub use broadcom::V3dClientMem;
pub use realtek::MaliContextProfiles;

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::collector::platform::{Platform, SourcePaths};
use crate::collector::procfs::PidResolver;
use crate::collector::sources::ProcessInfoSource;
use crate::collector::traits::FileSystem;
use crate::model::{GpuRecord, ProcessInfo};

/// GPU memory held by one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuAllocation {
    pub tid: u32,
    pub bytes: u64,
}

/// One vendor's view of GPU memory.
pub trait GpuBackend: Send {
    fn name(&self) -> &'static str;

    /// Whether the vendor interface exists on this system.
    fn is_available(&self) -> bool;

    /// Current allocations; malformed entries are left out.
    fn read_allocations(&self) -> Vec<GpuAllocation>;
}

/// Picks the backend for `platform`. `None` when the platform has no known
/// GPU interface.
pub fn backend_for<F: FileSystem + Clone + 'static>(
    platform: Platform,
    fs: &F,
    paths: &SourcePaths,
    page_size: u64,
) -> Option<Box<dyn GpuBackend>> {
    match platform {
        Platform::Broadcom => Some(Box::new(V3dClientMem::new(fs.clone(), &paths.debugfs))),
        Platform::Amlogic => Some(Box::new(MaliGpuMemory::new(
            fs.clone(),
            &paths.debugfs,
            page_size,
        ))),
        Platform::Realtek => Some(Box::new(MaliContextProfiles::new(
            fs.clone(),
            &paths.debugfs,
        ))),
        Platform::Unknown => None,
    }
}

/// Per-process GPU memory collector over one vendor backend.
pub struct GpuCollector<F: FileSystem> {
    backend: Option<Box<dyn GpuBackend>>,
    resolver: PidResolver<F>,
}

impl<F: FileSystem> GpuCollector<F> {
    /// Wraps `backend`, disabling the collector for good if the backend is
    /// missing or its interface is absent.
    pub fn new(backend: Option<Box<dyn GpuBackend>>, resolver: PidResolver<F>) -> Self {
        let backend = match backend {
            Some(b) if b.is_available() => {
                debug!(backend = b.name(), "GPU memory collection enabled");
                Some(b)
            }
            Some(b) => {
                debug!(backend = b.name(), "GPU memory interface not present");
                None
            }
            None => {
                debug!("GPU memory collection not supported on this platform");
                None
            }
        };

        Self { backend, resolver }
    }

    /// `false` once feature detection found no usable backend.
    pub fn is_supported(&self) -> bool {
        self.backend.is_some()
    }

    /// Reads current allocations and records each into its process record.
    ///
    /// # Arguments
    /// * `gpu` - Per-pid records; a record is created on the first sighting
    ///   of a pid, with identity taken from `processes`
    /// * `processes` - Identity lookup; `None` yields an anonymous identity
    ///
    /// Allocations whose thread cannot be resolved to a process are dropped.
    pub fn collect(&self, gpu: &mut BTreeMap<u32, GpuRecord>, processes: &dyn ProcessInfoSource) {
        let Some(backend) = &self.backend else {
            return;
        };

        for alloc in backend.read_allocations() {
            let pid = match self.resolver.resolve(alloc.tid) {
                Ok(pid) => pid,
                Err(e) => {
                    trace!(error = %e, bytes = alloc.bytes, "dropping GPU sample");
                    continue;
                }
            };

            gpu.entry(pid)
                .or_insert_with(|| {
                    let process = processes
                        .process(pid)
                        .unwrap_or_else(|| ProcessInfo::unknown(pid));
                    GpuRecord::new(process)
                })
                .used
                .record(alloc.bytes as f64);
        }
    }
}

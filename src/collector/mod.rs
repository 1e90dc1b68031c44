//! Memory telemetry collectors for set-top box Linux.
//!
//! Every collector reads kernel interfaces (`/proc`, `/sys`, debugfs)
//! through the [`FileSystem`] trait, so tests run against [`MockFs`].
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        MemoryCollector                        │
//! │  meminfo ─ cma ─ gpu ─ cgroup ─ bandwidth ─ bmem ─ frag ─ zram │
//! │                        │                                       │
//! │   PidResolver ─────────┤   ProcessInfoSource  ContainerSource  │
//! │                 ┌──────▼──────┐                                │
//! │                 │  FileSystem │ (trait)                        │
//! │                 └──────┬──────┘                                │
//! └────────────────────────┼──────────────────────────────────────┘
//!              ┌───────────┼───────────┐
//!       ┌──────▼─────┐ ┌───▼────┐ ┌────▼──────┐
//!       │   RealFs   │ │ MockFs │ │ Scenarios │
//!       └────────────┘ └────────┘ └───────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use memgauge::collector::{CollectorConfig, MemoryCollector, MockFs, Platform};
//!
//! let fs = MockFs::broadcom_box();
//! let mut collector = MemoryCollector::new(fs, CollectorConfig::new(Platform::Broadcom));
//! collector.collect_all();
//! assert!(!collector.data().linux.is_empty());
//! ```

pub mod bandwidth;
pub mod bmem;
pub mod cgroup;
pub mod cma;
#[allow(clippy::module_inception)]
mod collector;
pub mod fragmentation;
pub mod gpu;
pub mod meminfo;
pub mod mock;
pub mod platform;
pub mod procfs;
pub mod sources;
pub mod traits;
pub mod zram;

pub use cgroup::CgroupCollector;
pub use cma::CmaNameTable;
pub use collector::{
    Capabilities, CollectorConfig, DEFAULT_PAGE_SIZE, MemoryCollector, TickTiming,
};
pub use gpu::{GpuAllocation, GpuBackend};
pub use mock::MockFs;
pub use platform::{Platform, SourcePaths};
pub use procfs::{PidResolver, ResolveError};
pub use sources::{
    CgroupDirContainers, Container, ContainerSource, ProcessInfoSource, ProcfsProcessSource,
    StaticContainers,
};
pub use traits::{FileSystem, RealFs};

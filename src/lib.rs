//! memgauge - memory telemetry for set-top box Linux.
//!
//! Provides:
//! - `collector` - per-subsystem collectors (meminfo, CMA, GPU, cgroups,
//!   DDR bandwidth, bmem, buddy fragmentation, zram) behind a filesystem seam
//! - `model` - running measurements and the records they accumulate into
//! - `engine` - background sampling loop with start/stop/save lifecycle
//! - `report` - report sinks for saved results

pub mod collector;
pub mod engine;
pub mod model;
pub mod report;

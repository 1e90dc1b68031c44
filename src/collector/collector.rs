//! Main collector that runs every memory subsystem collector once per tick.
//!
//! `MemoryCollector` owns the per-subsystem collectors, the collaborators
//! they need and the accumulated [`MemoryData`].

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::collector::bandwidth::BandwidthCollector;
use crate::collector::bmem::BmemCollector;
use crate::collector::cgroup::CgroupCollector;
use crate::collector::cma::{CmaCollector, CmaNameTable};
use crate::collector::fragmentation::FragmentationCollector;
use crate::collector::gpu::{GpuCollector, backend_for};
use crate::collector::meminfo::LinuxMemoryCollector;
use crate::collector::platform::{Platform, SourcePaths};
use crate::collector::procfs::PidResolver;
use crate::collector::sources::{
    ContainerSource, ProcessInfoSource, ProcfsProcessSource, StaticContainers,
};
use crate::collector::traits::FileSystem;
use crate::collector::zram::ZramCollector;
use crate::model::MemoryData;

/// Default page size used to convert page counts.
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

/// Construction-time settings of a [`MemoryCollector`].
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub platform: Platform,
    pub paths: SourcePaths,
    pub page_size: u64,
    /// Collect zram statistics when the driver is present.
    pub zram: bool,
    /// CMA name table; discovered from debugfs when `None`.
    pub cma_areas: Option<CmaNameTable>,
}

impl CollectorConfig {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            paths: SourcePaths::default(),
            page_size: DEFAULT_PAGE_SIZE,
            zram: false,
            cma_areas: None,
        }
    }

    pub fn with_paths(mut self, paths: SourcePaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_zram(mut self, enabled: bool) -> Self {
        self.zram = enabled;
        self
    }

    pub fn with_cma_areas(mut self, areas: CmaNameTable) -> Self {
        self.cma_areas = Some(areas);
        self
    }
}

/// Which optional collectors survived feature detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub gpu: bool,
    pub bandwidth: bool,
    pub bmem: bool,
    pub zram: bool,
}

/// Timing of each subsystem during the last tick.
///
/// Used for debugging and for spotting slow kernel interfaces.
#[derive(Debug, Clone, Default)]
pub struct TickTiming {
    pub total: Duration,
    pub linux: Duration,
    pub cma: Duration,
    pub gpu: Duration,
    pub containers: Duration,
    pub bandwidth: Duration,
    pub bmem: Duration,
    pub fragmentation: Duration,
    pub zram: Duration,
}

pub struct MemoryCollector<F: FileSystem + Clone + 'static> {
    platform: Platform,
    linux: LinuxMemoryCollector<F>,
    cma: CmaCollector<F>,
    gpu: GpuCollector<F>,
    cgroup: CgroupCollector<F>,
    bandwidth: BandwidthCollector<F>,
    bmem: BmemCollector<F>,
    fragmentation: FragmentationCollector<F>,
    zram: ZramCollector<F>,
    processes: Box<dyn ProcessInfoSource>,
    containers: Box<dyn ContainerSource>,
    data: MemoryData,
    ticks: u64,
    last_timing: Option<TickTiming>,
}

impl<F: FileSystem + Clone + 'static> MemoryCollector<F> {
    /// Creates a collector, probing every optional kernel interface once.
    ///
    /// With no container source configured the container collector watches
    /// nothing; process identities come from procfs.
    pub fn new(fs: F, config: CollectorConfig) -> Self {
        let CollectorConfig {
            platform,
            paths,
            page_size,
            zram,
            cma_areas,
        } = config;

        let gpu_backend = backend_for(platform, &fs, &paths, page_size);
        let collector = Self {
            platform,
            linux: LinuxMemoryCollector::new(fs.clone(), &paths.proc),
            cma: CmaCollector::new(fs.clone(), &paths.debugfs, &paths.proc, page_size, cma_areas),
            gpu: GpuCollector::new(gpu_backend, PidResolver::new(fs.clone(), &paths.proc)),
            cgroup: CgroupCollector::new(fs.clone()),
            bandwidth: BandwidthCollector::new(fs.clone(), platform, &paths.sys),
            bmem: BmemCollector::new(fs.clone(), platform, &paths.proc),
            fragmentation: FragmentationCollector::new(fs.clone(), &paths.proc),
            zram: ZramCollector::new(fs.clone(), &paths.sys, zram),
            processes: Box::new(ProcfsProcessSource::new(fs, &paths.proc)),
            containers: Box::new(StaticContainers::default()),
            data: MemoryData::default(),
            ticks: 0,
            last_timing: None,
        };

        let caps = collector.capabilities();
        info!(
            %platform,
            gpu = caps.gpu,
            bandwidth = caps.bandwidth,
            bmem = caps.bmem,
            zram = caps.zram,
            cma_areas = collector.cma.names().len(),
            "memory collector ready"
        );

        collector
    }

    /// Sets the collaborator that decides which containers are watched.
    pub fn with_containers(mut self, containers: Box<dyn ContainerSource>) -> Self {
        self.containers = containers;
        self
    }

    /// Sets the collaborator that supplies process identities.
    pub fn with_process_source(mut self, processes: Box<dyn ProcessInfoSource>) -> Self {
        self.processes = processes;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            gpu: self.gpu.is_supported(),
            bandwidth: self.bandwidth.is_supported(),
            bmem: self.bmem.is_supported(),
            zram: self.zram.is_supported(),
        }
    }

    /// Data accumulated since the last [`reset`](Self::reset).
    pub fn data(&self) -> &MemoryData {
        &self.data
    }

    /// Number of completed ticks since the last reset.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn last_timing(&self) -> Option<&TickTiming> {
        self.last_timing.as_ref()
    }

    /// Drops all accumulated data, as at the start of a new session.
    pub fn reset(&mut self) {
        self.data.clear();
        self.ticks = 0;
        self.last_timing = None;
    }

    /// Runs one tick: every subsystem collector once, in fixed order.
    ///
    /// Failures inside a subsystem only affect that subsystem's records for
    /// this tick.
    pub fn collect_all(&mut self) {
        let total_start = Instant::now();
        let mut timing = TickTiming::default();
        let data = &mut self.data;

        let start = Instant::now();
        self.linux.collect(&mut data.linux);
        timing.linux = start.elapsed();

        let start = Instant::now();
        self.cma.collect(data);
        timing.cma = start.elapsed();

        let start = Instant::now();
        self.gpu.collect(&mut data.gpu, self.processes.as_ref());
        timing.gpu = start.elapsed();

        let start = Instant::now();
        let containers = self.containers.containers();
        self.cgroup.collect(&containers, &mut data.containers);
        timing.containers = start.elapsed();

        let start = Instant::now();
        self.bandwidth.collect(&mut data.bandwidth);
        timing.bandwidth = start.elapsed();

        let start = Instant::now();
        self.bmem.collect(&mut data.bmem);
        timing.bmem = start.elapsed();

        let start = Instant::now();
        self.fragmentation.collect(&mut data.fragmentation);
        timing.fragmentation = start.elapsed();

        let start = Instant::now();
        self.zram.collect(&mut data.zram);
        timing.zram = start.elapsed();

        timing.total = total_start.elapsed();
        self.ticks += 1;
        debug!(
            tick = self.ticks,
            duration_us = timing.total.as_micros() as u64,
            "collection pass completed"
        );
        self.last_timing = Some(timing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MockFs;
    use crate::collector::sources::{CgroupDirContainers, Container};
    use crate::model::ProcessInfo;

    #[test]
    fn test_broadcom_box_tick() {
        let fs = MockFs::broadcom_box();
        let mut collector = MemoryCollector::new(fs, CollectorConfig::new(Platform::Broadcom))
            .with_containers(Box::new(StaticContainers(vec![Container::new(
                "dac",
                "/sys/fs/cgroup/lxc/dac",
            )])));

        let caps = collector.capabilities();
        assert!(caps.gpu);
        assert!(caps.bmem);
        assert!(!caps.bandwidth);
        assert!(!caps.zram);

        collector.collect_all();
        let data = collector.data();

        assert_eq!(data.linux["MemFree"].snapshot().last, Some(100000.0));
        assert!(!data.linux.contains_key("Dirty"));
        assert_eq!(data.cma.len(), 2);
        assert_eq!(data.cma["cma-0"].size_kb, 262144);
        assert_eq!(data.cma_free.count(), 1);
        assert_eq!(data.bmem.len(), 2);

        // Two westeros threads plus the browser; tid 31337 does not resolve.
        assert_eq!(data.gpu.len(), 2);
        assert_eq!(data.gpu[&612].used.count(), 2);
        assert_eq!(data.gpu[&612].process.name, "westeros");
        assert_eq!(data.gpu[&1450].used.sum(), 33554432.0);

        assert_eq!(data.containers["dac"].usage.snapshot().last, Some(71680.0));
        assert_eq!(data.fragmentation["Normal"].len(), 11);
        assert!(data.zram.is_empty());
        assert!(data.bandwidth.is_empty());
        assert_eq!(collector.ticks(), 1);
        assert!(collector.last_timing().is_some());
    }

    #[test]
    fn test_amlogic_box_with_zram() {
        let fs = MockFs::amlogic_box();
        let mut collector =
            MemoryCollector::new(fs, CollectorConfig::new(Platform::Amlogic).with_zram(true));

        collector.collect_all();
        collector.collect_all();
        let data = collector.data();

        assert_eq!(data.bandwidth.count(), 2);
        assert_eq!(data.bandwidth.snapshot().avg, Some(23.41));
        assert_eq!(data.zram["zram0"].uncompressed_size.count(), 2);
        assert_eq!(data.gpu[&612].used.snapshot().last, Some(8192.0 * 4096.0));
        assert_eq!(data.gpu[&1450].used.count(), 2);
        assert!(data.bmem.is_empty());
        assert_eq!(data.cma["cma_reserved"].size_kb, 196608);
    }

    #[test]
    fn test_realtek_box_gpu() {
        let fs = MockFs::realtek_box();
        let mut collector = MemoryCollector::new(fs, CollectorConfig::new(Platform::Realtek));

        collector.collect_all();
        let data = collector.data();

        assert_eq!(data.gpu[&612].used.sum(), 8388608.0);
        assert_eq!(data.gpu[&1450].used.sum(), 2097152.0);
        assert!(data.cma.is_empty());
        assert!(data.cma_free.is_empty());
    }

    #[test]
    fn test_unknown_platform_collects_generic_sources() {
        let fs = MockFs::broadcom_box();
        let mut collector = MemoryCollector::new(fs, CollectorConfig::new(Platform::Unknown));
        assert_eq!(collector.capabilities(), Capabilities::default());

        collector.collect_all();
        assert!(collector.data().gpu.is_empty());
        assert!(collector.data().bmem.is_empty());
        assert!(!collector.data().linux.is_empty());
    }

    #[test]
    fn test_explicit_cma_table_and_container_dirs() {
        let fs = MockFs::broadcom_box();
        let table = CmaNameTable::from([("video".to_string(), "cma-0".to_string())]);
        let mut collector = MemoryCollector::new(
            fs.clone(),
            CollectorConfig::new(Platform::Broadcom).with_cma_areas(table),
        )
        .with_containers(Box::new(CgroupDirContainers::new(fs, "/sys/fs/cgroup/lxc")));

        collector.collect_all();
        let data = collector.data();
        assert_eq!(data.cma.keys().collect::<Vec<_>>(), vec!["video"]);
        assert!(data.containers.contains_key("dac"));
    }

    struct NamedProcesses;

    impl ProcessInfoSource for NamedProcesses {
        fn process(&self, pid: u32) -> Option<ProcessInfo> {
            Some(ProcessInfo {
                pid,
                name: format!("proc-{}", pid),
                cmdline: String::new(),
            })
        }
    }

    #[test]
    fn test_custom_process_source() {
        let fs = MockFs::broadcom_box();
        let mut collector = MemoryCollector::new(fs, CollectorConfig::new(Platform::Broadcom))
            .with_process_source(Box::new(NamedProcesses));

        collector.collect_all();
        assert_eq!(collector.data().gpu[&612].process.name, "proc-612");
    }

    #[test]
    fn test_reset_clears_data() {
        let fs = MockFs::broadcom_box();
        let mut collector = MemoryCollector::new(fs, CollectorConfig::new(Platform::Broadcom));
        collector.collect_all();
        assert!(!collector.data().is_empty());

        collector.reset();
        assert!(collector.data().is_empty());
        assert_eq!(collector.ticks(), 0);
        assert!(collector.last_timing().is_none());
    }
}

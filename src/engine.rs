//! Collection engine: drives a [`MemoryCollector`] from a background thread.
//!
//! [`MemoryMetric`] implements the [`Metric`] plugin contract. Starting it
//! clears previous results and spawns one sampling thread; each cycle waits
//! for the interval (or a stop signal), then runs one full collection pass.
//! Stopping wakes the wait immediately and joins the thread.

use std::fmt;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::collector::{FileSystem, MemoryCollector};
use crate::model::MemoryData;
use crate::report::{MemoryReport, ReportSink, SinkError};

const THREAD_NAME: &str = "memgauge-collector";

/// Plugin contract of a periodically sampled metric.
pub trait Metric {
    fn name(&self) -> &'static str;

    /// Starts sampling every `frequency`.
    fn start_collection(&mut self, frequency: Duration) -> Result<(), MetricError>;

    /// Stops sampling. Safe to call at any time, any number of times.
    fn stop_collection(&mut self);

    /// Hands the results accumulated so far to the report sink.
    fn save_results(&self) -> Result<(), MetricError>;
}

#[derive(Debug)]
pub enum MetricError {
    /// Sampling frequency must be non-zero.
    InvalidFrequency,
    AlreadyRunning,
    /// The sampling thread could not be created.
    Spawn(io::Error),
    Sink(SinkError),
}

impl fmt::Display for MetricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricError::InvalidFrequency => write!(f, "collection frequency must be non-zero"),
            MetricError::AlreadyRunning => write!(f, "collection is already running"),
            MetricError::Spawn(e) => write!(f, "failed to spawn collector thread: {}", e),
            MetricError::Sink(e) => write!(f, "failed to save results: {}", e),
        }
    }
}

impl std::error::Error for MetricError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetricError::Spawn(e) => Some(e),
            MetricError::Sink(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SinkError> for MetricError {
    fn from(e: SinkError) -> Self {
        MetricError::Sink(e)
    }
}

/// Lifecycle of a [`MemoryMetric`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Running,
    Stopped,
}

/// Stop flag with a cancellable wait.
#[derive(Debug, Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    fn flag(&self) -> MutexGuard<'_, bool> {
        self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn arm(&self) {
        *self.flag() = false;
    }

    fn raise(&self) {
        *self.flag() = true;
        self.cond.notify_all();
    }

    /// Waits up to `timeout`; returns true if stop was requested.
    fn wait(&self, timeout: Duration) -> bool {
        let guard = self.flag();
        let (guard, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Memory telemetry engine.
pub struct MemoryMetric<F: FileSystem + Clone + 'static> {
    collector: Arc<Mutex<MemoryCollector<F>>>,
    stop: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
    sink: Arc<dyn ReportSink>,
    state: EngineState,
}

impl<F: FileSystem + Clone + 'static> MemoryMetric<F> {
    pub fn new(collector: MemoryCollector<F>, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            collector: Arc::new(Mutex::new(collector)),
            stop: Arc::new(StopSignal::default()),
            handle: None,
            sink,
            state: EngineState::Created,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Copy of the data accumulated so far, taken between ticks.
    pub fn data(&self) -> MemoryData {
        lock(&self.collector).data().clone()
    }

    /// Completed ticks of the current (or last) session.
    pub fn ticks(&self) -> u64 {
        lock(&self.collector).ticks()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reports a loop thread that unwinds out of a collection pass.
struct LoopExitGuard;

impl Drop for LoopExitGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("collector loop aborted by a panic, no further samples this session");
        }
    }
}

fn run_loop<F: FileSystem + Clone + 'static>(
    collector: Arc<Mutex<MemoryCollector<F>>>,
    stop: Arc<StopSignal>,
    frequency: Duration,
) {
    let _exit = LoopExitGuard;
    debug!(interval_ms = frequency.as_millis() as u64, "collector loop started");

    while !stop.wait(frequency) {
        let started = Instant::now();
        lock(&collector).collect_all();
        let elapsed = started.elapsed();

        if elapsed > frequency {
            warn!(
                duration_ms = elapsed.as_millis() as u64,
                interval_ms = frequency.as_millis() as u64,
                "collection pass exceeded interval"
            );
        }
    }

    debug!("collector loop finished");
}

impl<F: FileSystem + Clone + 'static> Metric for MemoryMetric<F> {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn start_collection(&mut self, frequency: Duration) -> Result<(), MetricError> {
        if frequency.is_zero() {
            return Err(MetricError::InvalidFrequency);
        }
        if self.state == EngineState::Running {
            return Err(MetricError::AlreadyRunning);
        }

        // Poison from a panicked session is stale once reset() has run.
        self.collector.clear_poison();
        lock(&self.collector).reset();
        self.stop.arm();

        let collector = Arc::clone(&self.collector);
        let stop = Arc::clone(&self.stop);
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run_loop(collector, stop, frequency))
            .map_err(MetricError::Spawn)?;

        self.handle = Some(handle);
        self.state = EngineState::Running;
        info!(
            interval_ms = frequency.as_millis() as u64,
            "memory collection started"
        );
        Ok(())
    }

    fn stop_collection(&mut self) {
        if self.state != EngineState::Running {
            return;
        }

        self.stop.raise();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("collector thread panicked");
        }

        self.state = EngineState::Stopped;
        info!(ticks = self.ticks(), "memory collection stopped");
    }

    fn save_results(&self) -> Result<(), MetricError> {
        let report = {
            let collector = lock(&self.collector);
            MemoryReport::new(
                collector.platform(),
                collector.ticks(),
                collector.data().clone(),
            )
        };
        self.sink.submit(&report)?;
        Ok(())
    }
}

impl<F: FileSystem + Clone + 'static> Drop for MemoryMetric<F> {
    fn drop(&mut self) {
        self.stop_collection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{CollectorConfig, Container, ContainerSource, MockFs, Platform};

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<MemoryReport>>,
    }

    impl ReportSink for RecordingSink {
        fn submit(&self, report: &MemoryReport) -> Result<(), SinkError> {
            lock(&self.reports).push(report.clone());
            Ok(())
        }
    }

    struct ExplodingContainers;

    impl ContainerSource for ExplodingContainers {
        fn containers(&self) -> Vec<Container> {
            panic!("container registry unavailable");
        }
    }

    struct FailingSink;

    impl ReportSink for FailingSink {
        fn submit(&self, _report: &MemoryReport) -> Result<(), SinkError> {
            Err(SinkError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }
    }

    fn engine(fs: MockFs, platform: Platform) -> (MemoryMetric<MockFs>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let collector = MemoryCollector::new(fs, CollectorConfig::new(platform));
        (MemoryMetric::new(collector, sink.clone()), sink)
    }

    #[test]
    fn test_start_then_immediate_stop_is_empty() {
        let (mut metric, sink) = engine(MockFs::broadcom_box(), Platform::Broadcom);
        assert_eq!(metric.state(), EngineState::Created);

        let started = Instant::now();
        metric.start_collection(Duration::from_secs(60)).unwrap();
        assert_eq!(metric.state(), EngineState::Running);
        metric.stop_collection();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(metric.state(), EngineState::Stopped);
        assert!(metric.data().is_empty());

        metric.save_results().unwrap();
        let reports = lock(&sink.reports);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].ticks, 0);
        assert!(reports[0].data.is_empty());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut metric, _sink) = engine(MockFs::broadcom_box(), Platform::Broadcom);
        metric.stop_collection();
        assert_eq!(metric.state(), EngineState::Created);

        metric.start_collection(Duration::from_secs(30)).unwrap();
        metric.stop_collection();
        metric.stop_collection();
        assert_eq!(metric.state(), EngineState::Stopped);
    }

    #[test]
    fn test_invalid_frequency() {
        let (mut metric, _sink) = engine(MockFs::broadcom_box(), Platform::Broadcom);
        let err = metric.start_collection(Duration::ZERO).unwrap_err();
        assert!(matches!(err, MetricError::InvalidFrequency));
        assert_eq!(metric.state(), EngineState::Created);
    }

    #[test]
    fn test_start_while_running() {
        let (mut metric, _sink) = engine(MockFs::broadcom_box(), Platform::Broadcom);
        metric.start_collection(Duration::from_secs(30)).unwrap();

        let err = metric.start_collection(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, MetricError::AlreadyRunning));
        assert_eq!(metric.state(), EngineState::Running);

        metric.stop_collection();
    }

    #[test]
    fn test_periodic_collection() {
        let (mut metric, sink) = engine(MockFs::broadcom_box(), Platform::Broadcom);

        metric.start_collection(Duration::from_secs(1)).unwrap();
        thread::sleep(Duration::from_millis(3500));
        metric.stop_collection();

        let data = metric.data();
        let mem_free = data.linux["MemFree"].snapshot();
        assert_eq!(mem_free.count, 3);
        assert_eq!(mem_free.min, Some(100000.0));
        assert_eq!(mem_free.max, Some(100000.0));
        assert_eq!(mem_free.avg, Some(100000.0));
        assert_eq!(metric.ticks(), 3);

        metric.save_results().unwrap();
        let reports = lock(&sink.reports);
        assert_eq!(reports[0].platform, Platform::Broadcom);
        assert_eq!(reports[0].data, data);
    }

    #[test]
    fn test_cma_area_disappears_mid_session() {
        let mut fs = MockFs::broadcom_box();
        let (mut metric, _sink) = engine(fs.clone(), Platform::Broadcom);

        metric.start_collection(Duration::from_millis(200)).unwrap();
        thread::sleep(Duration::from_millis(500));
        fs.remove("/sys/kernel/debug/cma/cma-1");
        let cma1_before = metric.data().cma["cma-1"].used.count();
        thread::sleep(Duration::from_millis(500));
        metric.stop_collection();

        let data = metric.data();
        assert!(cma1_before >= 1);
        assert_eq!(data.cma["cma-1"].used.count(), cma1_before);
        assert!(data.cma["cma-0"].used.count() > cma1_before);
    }

    #[test]
    fn test_restart_clears_previous_session() {
        let (mut metric, _sink) = engine(MockFs::amlogic_box(), Platform::Amlogic);

        metric.start_collection(Duration::from_millis(100)).unwrap();
        thread::sleep(Duration::from_millis(350));
        metric.stop_collection();
        assert!(metric.ticks() >= 1);
        assert!(!metric.data().is_empty());

        metric.start_collection(Duration::from_secs(60)).unwrap();
        assert!(metric.data().is_empty());
        assert_eq!(metric.ticks(), 0);
        metric.stop_collection();
        assert!(metric.data().is_empty());
    }

    #[test]
    fn test_save_does_not_clear_data() {
        let (mut metric, sink) = engine(MockFs::realtek_box(), Platform::Realtek);

        metric.start_collection(Duration::from_millis(100)).unwrap();
        thread::sleep(Duration::from_millis(250));
        metric.save_results().unwrap();
        metric.stop_collection();
        metric.save_results().unwrap();

        let reports = lock(&sink.reports);
        assert_eq!(reports.len(), 2);
        assert!(reports[1].ticks >= reports[0].ticks);
        assert!(!reports[1].data.gpu.is_empty());
    }

    #[test]
    fn test_sink_failure_is_reported() {
        let collector =
            MemoryCollector::new(MockFs::broadcom_box(), CollectorConfig::new(Platform::Broadcom));
        let metric = MemoryMetric::new(collector, Arc::new(FailingSink));

        let err = metric.save_results().unwrap_err();
        assert!(matches!(err, MetricError::Sink(SinkError::Io(_))));
        assert_eq!(metric.name(), "memory");
    }

    #[test]
    fn test_panicking_tick_does_not_wedge_stop_or_save() {
        let sink = Arc::new(RecordingSink::default());
        let collector =
            MemoryCollector::new(MockFs::broadcom_box(), CollectorConfig::new(Platform::Broadcom))
                .with_containers(Box::new(ExplodingContainers));
        let mut metric = MemoryMetric::new(collector, sink.clone());

        metric.start_collection(Duration::from_millis(50)).unwrap();
        thread::sleep(Duration::from_millis(300));
        assert!(metric.collector.is_poisoned());

        let started = Instant::now();
        metric.stop_collection();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(metric.state(), EngineState::Stopped);

        metric.save_results().unwrap();
        let reports = lock(&sink.reports);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].ticks, 0);
        // Subsystems before the panicking one recorded their sample.
        assert_eq!(reports[0].data.linux["MemFree"].count(), 1);
        assert!(reports[0].data.containers.is_empty());
    }

    #[test]
    fn test_restart_after_panicked_session() {
        let fs = MockFs::broadcom_box();
        let collector = MemoryCollector::new(fs, CollectorConfig::new(Platform::Broadcom))
            .with_containers(Box::new(ExplodingContainers));
        let mut metric = MemoryMetric::new(collector, Arc::new(RecordingSink::default()));

        metric.start_collection(Duration::from_millis(50)).unwrap();
        thread::sleep(Duration::from_millis(200));
        metric.stop_collection();

        assert!(metric.collector.is_poisoned());

        metric.start_collection(Duration::from_secs(60)).unwrap();
        assert!(!metric.collector.is_poisoned());
        assert_eq!(metric.state(), EngineState::Running);
        assert!(metric.data().is_empty());
        metric.stop_collection();
        assert_eq!(metric.state(), EngineState::Stopped);
    }

    #[test]
    fn test_drop_stops_running_loop() {
        let (mut metric, _sink) = engine(MockFs::broadcom_box(), Platform::Broadcom);
        metric.start_collection(Duration::from_secs(60)).unwrap();

        let started = Instant::now();
        drop(metric);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}

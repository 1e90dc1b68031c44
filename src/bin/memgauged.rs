//! memgauged - memory telemetry collector daemon.
//!
//! Samples memory subsystems of a set-top box at a fixed interval and writes
//! the accumulated statistics as a JSON report on shutdown.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use memgauge::collector::{
    CgroupDirContainers, CollectorConfig, Container, MemoryCollector, Platform, RealFs,
    SourcePaths, StaticContainers,
};
use memgauge::engine::{MemoryMetric, Metric};
use memgauge::report::JsonReportSink;

/// Memory telemetry collector daemon.
#[derive(Parser)]
#[command(name = "memgauged", about = "Memory telemetry collector daemon", version)]
struct Args {
    /// Collection interval in seconds.
    #[arg(short, long, default_value = "10")]
    interval: u64,

    /// Stop after this many seconds (0 = run until Ctrl-C).
    #[arg(short, long, default_value = "0")]
    duration: u64,

    /// SoC platform: broadcom, amlogic, realtek or unknown.
    #[arg(short, long, default_value = "unknown")]
    platform: Platform,

    /// Collect zram statistics.
    #[arg(long)]
    zram: bool,

    /// Report file written on shutdown.
    #[arg(short, long, default_value = "./memgauge.json")]
    output: String,

    /// Container to watch, as ID=CGROUP_PATH. May be repeated.
    #[arg(long = "container", value_name = "ID=PATH", value_parser = parse_container)]
    containers: Vec<Container>,

    /// Watch every sub-cgroup of this directory as a container.
    /// Takes precedence over --container.
    #[arg(long, value_name = "PATH")]
    cgroup_parent: Option<String>,

    /// Kernel page size in bytes.
    #[arg(long, default_value = "4096")]
    page_size: u64,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Path to /sys filesystem.
    #[arg(long, default_value = "/sys")]
    sys_path: String,

    /// Path to debugfs.
    #[arg(long, default_value = "/sys/kernel/debug")]
    debugfs_path: String,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Parses `ID=PATH` into a container.
fn parse_container(s: &str) -> Result<Container, String> {
    match s.split_once('=') {
        Some((id, path)) if !id.trim().is_empty() && !path.trim().is_empty() => {
            Ok(Container::new(id.trim(), path.trim()))
        }
        _ => Err(format!("invalid container '{}': expected ID=PATH", s)),
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["memgauged", "memgauge"] {
        match format!("{}={}", target, level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("invalid log directive for {}: {}", target, e),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("memgauged {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}s, platform={}, zram={}, output={}",
        args.interval, args.platform, args.zram, args.output
    );

    let paths = SourcePaths {
        proc: args.proc_path.clone().into(),
        sys: args.sys_path.clone().into(),
        debugfs: args.debugfs_path.clone().into(),
    };
    let config = CollectorConfig::new(args.platform)
        .with_paths(paths)
        .with_page_size(args.page_size)
        .with_zram(args.zram);

    let fs = RealFs::new();
    let mut collector = MemoryCollector::new(fs, config);
    if let Some(ref parent) = args.cgroup_parent {
        info!("Containers: every cgroup under {}", parent);
        collector = collector.with_containers(Box::new(CgroupDirContainers::new(fs, parent)));
    } else if !args.containers.is_empty() {
        info!("Containers: {} configured", args.containers.len());
        collector = collector.with_containers(Box::new(StaticContainers(args.containers.clone())));
    }

    let sink = Arc::new(JsonReportSink::new(&args.output));
    let mut metric = MemoryMetric::new(collector, sink);

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    if let Err(e) = metric.start_collection(Duration::from_secs(args.interval)) {
        error!("Failed to start collection: {}", e);
        return ExitCode::FAILURE;
    }

    let deadline = (args.duration > 0).then(|| Instant::now() + Duration::from_secs(args.duration));
    while running.load(Ordering::SeqCst) && deadline.is_none_or(|d| Instant::now() < d) {
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("Shutting down...");
    metric.stop_collection();

    match metric.save_results() {
        Ok(()) => {
            info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to save results: {}", e);
            ExitCode::FAILURE
        }
    }
}

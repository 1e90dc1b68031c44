//! Container memory collector over cgroup v2 with a v1 fallback.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::trace;

use crate::collector::sources::Container;
use crate::collector::traits::FileSystem;
use crate::model::{ContainerRecord, bytes_to_kb};

use super::parser;

/// File names of one cgroup hierarchy version.
struct ControllerFiles {
    usage: &'static str,
    limit: &'static str,
    swap: Option<&'static str>,
}

const V2_FILES: ControllerFiles = ControllerFiles {
    usage: "memory.current",
    limit: "memory.max",
    swap: Some("memory.swap.current"),
};

const V1_FILES: ControllerFiles = ControllerFiles {
    usage: "memory.usage_in_bytes",
    limit: "memory.limit_in_bytes",
    swap: None,
};

/// Collects memory usage, limit, cache, rss and swap of the watched
/// containers.
pub struct CgroupCollector<F: FileSystem> {
    fs: F,
}

impl<F: FileSystem> CgroupCollector<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }

    pub fn collect(
        &self,
        containers: &[Container],
        records: &mut BTreeMap<String, ContainerRecord>,
    ) {
        for container in containers {
            if !self.collect_one(container, records) {
                trace!(container = %container.id, "no cgroup memory data this tick");
            }
        }
    }

    /// Returns `false` when the container's usage could not be read.
    fn collect_one(
        &self,
        container: &Container,
        records: &mut BTreeMap<String, ContainerRecord>,
    ) -> bool {
        let cgroup = container.cgroup_path.as_path();
        let (files, usage) = if let Some(usage) = self.read_bytes(cgroup, V2_FILES.usage) {
            (&V2_FILES, usage)
        } else if let Some(usage) = self.read_bytes(cgroup, V1_FILES.usage) {
            (&V1_FILES, usage)
        } else {
            return false;
        };

        let record = records.entry(container.id.clone()).or_default();
        record.usage.record(bytes_to_kb(usage));

        if let Some(limit) = self
            .fs
            .read_to_string(&cgroup.join(files.limit))
            .ok()
            .and_then(|c| parser::parse_memory_max(&c))
        {
            record.limit.record(bytes_to_kb(limit));
        }

        if let Ok(content) = self.fs.read_to_string(&cgroup.join("memory.stat")) {
            let stat = parser::parse_memory_stat(&content);
            if let Some(cache) = stat.cache {
                record.cache.record(bytes_to_kb(cache));
            }
            if let Some(rss) = stat.rss {
                record.rss.record(bytes_to_kb(rss));
            }
        }

        if let Some(swap) = files.swap.and_then(|name| self.read_bytes(cgroup, name)) {
            record.swap.record(bytes_to_kb(swap));
        }

        true
    }

    fn read_bytes(&self, cgroup: &Path, name: &str) -> Option<u64> {
        let content = self.fs.read_to_string(&cgroup.join(name)).ok()?;
        parser::parse_memory_current(&content)
    }
}

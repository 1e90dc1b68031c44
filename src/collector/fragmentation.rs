//! Buddy allocator fragmentation per zone.
//!
//! For a zone with `n_i` free blocks of order `i`, the free pages held at
//! order `i` are `p_i = n_i * 2^i` and the zone's free total is
//! `T = sum(p_i)`. The unusable free space index for order `j` is the share
//! of free memory that cannot satisfy an order-`j` allocation:
//!
//! ```text
//! U_j = 100 * (T - sum_{i >= j} p_i) / T
//! ```
//!
//! `U_0` is always 0 and `U_j` never decreases with `j` for a consistent
//! histogram.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::trace;

use crate::collector::procfs::parser::{BuddyZone, parse_buddyinfo};
use crate::collector::traits::FileSystem;
use crate::model::FragmentationEntry;

/// Number of buddy orders the kernel reports (`MAX_ORDER` of 11).
pub const MAX_ORDER: usize = 11;

/// Buddy allocator fragmentation per memory zone.
pub struct FragmentationCollector<F: FileSystem> {
    fs: F,
    buddyinfo_path: PathBuf,
}

impl<F: FileSystem> FragmentationCollector<F> {
    pub fn new(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            buddyinfo_path: proc_path.into().join("buddyinfo"),
        }
    }

    /// Appends one sample per order to every zone's series.
    ///
    /// # Arguments
    /// * `fragmentation` - Series keyed by zone (`Normal`, `node1/Normal`);
    ///   position in each series is the buddy order
    pub fn collect(&self, fragmentation: &mut BTreeMap<String, Vec<FragmentationEntry>>) {
        let Ok(content) = self.fs.read_to_string(&self.buddyinfo_path) else {
            trace!(path = ?self.buddyinfo_path, "buddyinfo unavailable");
            return;
        };

        for zone in parse_buddyinfo(&content) {
            let series = fragmentation.entry(zone_key(&zone)).or_default();
            record_zone(series, &zone.free_blocks);
        }
    }
}

/// `Normal` for node 0, `node1/Normal` otherwise.
fn zone_key(zone: &BuddyZone) -> String {
    if zone.node == 0 {
        zone.zone.clone()
    } else {
        format!("node{}/{}", zone.node, zone.zone)
    }
}

/// Writes one tick of a zone into its series, position by position.
fn record_zone(series: &mut Vec<FragmentationEntry>, free_blocks: &[u64]) {
    let free_blocks = &free_blocks[..free_blocks.len().min(MAX_ORDER)];
    let free_pages = free_pages_per_order(free_blocks);
    let indices = unusable_index(&free_pages);

    if series.len() < free_pages.len() {
        series.resize_with(free_pages.len(), FragmentationEntry::default);
    }

    for (order, pages) in free_pages.iter().enumerate() {
        let entry = &mut series[order];
        entry.free_pages.record(*pages as f64);
        if let Some(index) = indices.as_ref().map(|v| v[order]) {
            entry.fragmentation.record(index);
        }
    }
}

/// `n_i * 2^i` for every order.
pub fn free_pages_per_order(free_blocks: &[u64]) -> Vec<u64> {
    free_blocks
        .iter()
        .enumerate()
        .map(|(order, blocks)| blocks.saturating_mul(1u64 << order))
        .collect()
}

/// Unusable free space index (percent) for every order, or `None` when the
/// zone has no free pages at all or its page total does not fit in a `u64`.
pub fn unusable_index(free_pages: &[u64]) -> Option<Vec<f64>> {
    let total = free_pages
        .iter()
        .try_fold(0u64, |acc, &pages| acc.checked_add(pages))?;
    if total == 0 {
        return None;
    }

    let mut usable_at_or_above = total;
    let mut indices = Vec::with_capacity(free_pages.len());
    for pages in free_pages {
        indices.push(100.0 * (total - usable_at_or_above) as f64 / total as f64);
        usable_at_or_above -= pages;
    }
    Some(indices)
}

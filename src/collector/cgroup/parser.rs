//! Parsers for cgroup memory controller files (v2 and v1).

/// Values at or above this are the v1 "no limit" sentinel
/// (`PAGE_COUNTER_MAX` rounded to a page, 0x7FFFFFFFFFFFF000 on 64-bit).
const V1_UNLIMITED_THRESHOLD: u64 = 1 << 62;

/// Memory counters from `memory.stat` that the collector keeps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStat {
    /// Anonymous memory: `anon` (v2) or `rss` (v1), bytes.
    pub rss: Option<u64>,
    /// Page cache: `file` (v2) or `cache` (v1), bytes.
    pub cache: Option<u64>,
}

/// Parses `memory.current` (v2) or `memory.usage_in_bytes` (v1).
/// Format: number (bytes)
pub fn parse_memory_current(content: &str) -> Option<u64> {
    content.trim().parse().ok()
}

/// Parses `memory.max` (v2) or `memory.limit_in_bytes` (v1).
///
/// Returns `None` for `max` and for the v1 unlimited sentinel.
pub fn parse_memory_max(content: &str) -> Option<u64> {
    let trimmed = content.trim();
    if trimmed == "max" {
        return None;
    }
    trimmed
        .parse()
        .ok()
        .filter(|&limit| limit < V1_UNLIMITED_THRESHOLD)
}

/// Parses `memory.stat`.
/// Format: key value pairs, one per line
pub fn parse_memory_stat(content: &str) -> MemoryStat {
    let mut stat = MemoryStat::default();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }

        let Ok(value) = parts[1].parse::<u64>() else {
            continue;
        };

        match parts[0] {
            "anon" | "rss" => stat.rss = Some(value),
            "file" | "cache" => stat.cache = Some(value),
            _ => {}
        }
    }

    stat
}

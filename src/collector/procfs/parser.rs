//! Parsers for `/proc` filesystem files.
//!
//! These are pure functions over file contents so they can be tested with
//! plain strings.

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parses `/proc/meminfo` into `(field, value)` pairs in file order.
///
/// Values are in the unit the kernel prints (kB for sizes, plain counts for
/// `HugePages_*`). Lines whose value is not an integer are skipped.
pub fn parse_meminfo(content: &str) -> Vec<(&str, u64)> {
    content
        .lines()
        .filter_map(|line| {
            let (key, rest) = line.split_once(':')?;
            let value = rest.split_whitespace().next()?.parse().ok()?;
            Some((key.trim(), value))
        })
        .collect()
}

/// Looks up a single field in `/proc/meminfo` content.
pub fn meminfo_field(content: &str, field: &str) -> Option<u64> {
    parse_meminfo(content)
        .into_iter()
        .find_map(|(key, value)| (key == field).then_some(value))
}

/// Extracts the thread-group id from `/proc/[tid]/status`.
pub fn parse_status_tgid(content: &str) -> Result<u32, ParseError> {
    for line in content.lines() {
        if let Some(value) = line.strip_prefix("Tgid:") {
            return value
                .trim()
                .parse()
                .map_err(|_| ParseError::new(format!("invalid Tgid: {:?}", value.trim())));
        }
    }
    Err(ParseError::new("missing Tgid line in status"))
}

/// One row of `/proc/buddyinfo`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BuddyZone {
    pub node: u32,
    pub zone: String,
    /// Free block counts, index = order.
    pub free_blocks: Vec<u64>,
}

/// Parses `/proc/buddyinfo`.
///
/// Format: `Node 0, zone   Normal   12  8  4  2  1  0  0  0  0  0  0`.
/// Counts stop at the first non-numeric column so that column positions
/// always match buddy orders.
pub fn parse_buddyinfo(content: &str) -> Vec<BuddyZone> {
    let mut zones = Vec::new();

    for line in content.lines() {
        let Some((node_part, rest)) = line.split_once(',') else {
            continue;
        };
        let Some(node) = node_part
            .trim()
            .strip_prefix("Node")
            .and_then(|n| n.trim().parse().ok())
        else {
            continue;
        };

        let mut parts = rest.split_whitespace();
        if parts.next() != Some("zone") {
            continue;
        }
        let Some(zone) = parts.next() else {
            continue;
        };

        let free_blocks = parts.map_while(|s| s.parse().ok()).collect();

        zones.push(BuddyZone {
            node,
            zone: zone.to_string(),
            free_blocks,
        });
    }

    zones
}

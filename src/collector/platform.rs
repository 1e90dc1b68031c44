//! Construction-time platform selection and kernel source locations.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// SoC family the collector runs on.
///
/// Fixes which GPU backend is used and which vendor interfaces
/// (bandwidth counters, bmem) are probed. Immutable for the lifetime of a
/// collector.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Broadcom,
    Amlogic,
    Realtek,
    #[default]
    Unknown,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Broadcom => "broadcom",
            Platform::Amlogic => "amlogic",
            Platform::Realtek => "realtek",
            Platform::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "broadcom" | "brcm" => Ok(Platform::Broadcom),
            "amlogic" | "aml" => Ok(Platform::Amlogic),
            "realtek" | "rtk" => Ok(Platform::Realtek),
            "unknown" => Ok(Platform::Unknown),
            other => Err(format!("unknown platform '{}'", other)),
        }
    }
}

/// Mount points of the pseudo-filesystems the collectors read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourcePaths {
    pub proc: PathBuf,
    pub sys: PathBuf,
    pub debugfs: PathBuf,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            proc: PathBuf::from("/proc"),
            sys: PathBuf::from("/sys"),
            debugfs: PathBuf::from("/sys/kernel/debug"),
        }
    }
}

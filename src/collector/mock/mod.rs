//! Mock filesystem for testing collectors without real kernel interfaces.
//!
//! This module provides `MockFs` and pre-built set-top box scenarios.

mod filesystem;
mod scenarios;

pub use filesystem::MockFs;

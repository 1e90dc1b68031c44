//! Container memory from the cgroup memory controller.
//!
//! Which containers are watched is decided by a
//! [`ContainerSource`](crate::collector::sources::ContainerSource); this
//! module only reads their accounting files.

mod collector;
mod parser;

pub use collector::CgroupCollector;

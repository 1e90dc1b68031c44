//! Readers for the Linux `/proc` filesystem.

pub mod parser;
pub mod pid;

pub use parser::ParseError;
pub use pid::{PidResolver, ResolveError};

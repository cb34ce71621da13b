//! CLI command implementations.

pub mod discovery;

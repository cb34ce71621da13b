//! Session store implementations
//!
//! - `FileSessionStore`: JSON file, survives restarts (used by the CLI)
//! - `MemorySessionStore`: process-local, for embedding and tests

pub mod file_store;
pub mod memory_store;

pub use file_store::FileSessionStore;
pub use memory_store::MemorySessionStore;

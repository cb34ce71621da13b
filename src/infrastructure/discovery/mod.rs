//! Discovery Service HTTP integration.
//!
//! Implements the `DiscoveryService` port on top of reqwest, including the
//! optional server-sent event channel used for push delivery.

pub mod client;
pub mod errors;
pub mod streaming;

pub use client::{DiscoveryClientConfig, HttpDiscoveryClient};
pub use streaming::SseStreamParser;

//! Infrastructure layer module
//!
//! Adapters and external integrations:
//! - Discovery Service HTTP client (reqwest, server-sent events)
//! - Session store implementations
//! - Configuration management
//! - Logging infrastructure
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod discovery;
pub mod logging;
pub mod store;

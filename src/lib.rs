//! dpi-console: discovery session tracking for a DPI-circumvention daemon
//!
//! The daemon searches for a packet-manipulation strategy that gets traffic to
//! a blocked domain past deep packet inspection. This crate is the client side
//! of that search: it starts a discovery session, keeps a durable record of its
//! id, synchronises its status, and turns raw per-preset trials into a ranked
//! view for the operator.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): session data model, view model, ports and errors
//! - **Service Layer** (`services`): result aggregator, status poller, session coordinator
//! - **Infrastructure Layer** (`infrastructure`): HTTP client, session stores, config, logging
//! - **CLI Layer** (`cli`): `dpi-console discovery ...`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dpi_console::{
//!     CoordinatorSettings, DiscoveryCoordinator, FileSessionStore, HttpDiscoveryClient,
//!     StartOptions, StatusPoller,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = Arc::new(HttpDiscoveryClient::new()?);
//!     let store = Arc::new(FileSessionStore::new(".dpi-console/discovery-session.json"));
//!     let poller = StatusPoller::new(service.clone());
//!     let coordinator =
//!         DiscoveryCoordinator::mount(service, store, poller, CoordinatorSettings::default()).await;
//!
//!     coordinator.start("youtube.com", StartOptions::default()).await?;
//!     let mut views = coordinator.subscribe();
//!     while views.changed().await.is_ok() {
//!         let view = views.borrow().clone();
//!         println!("{} {:?}", view.state, view.progress);
//!         if view.state.is_terminal() {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DiscoveryError, ServiceError, StoreError};
pub use domain::models::{
    Config, CoordinatorState, DiscoverySession, DiscoveryView, Progress, RankedDomain,
    StartOptions,
};
pub use domain::ports::{DiscoveryService, SessionStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::discovery::HttpDiscoveryClient;
pub use infrastructure::logging::LoggerImpl;
pub use infrastructure::store::{FileSessionStore, MemorySessionStore};
pub use services::{CoordinatorSettings, DiscoveryCoordinator, StatusPoller};

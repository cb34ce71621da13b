//! Port trait definitions (Hexagonal Architecture)
//!
//! - DiscoveryService: the remote daemon that runs strategy searches
//! - SessionStore: local persistence of the active session id

pub mod discovery_service;
pub mod session_store;

pub use discovery_service::{DiscoveryService, SessionStream};
pub use session_store::SessionStore;

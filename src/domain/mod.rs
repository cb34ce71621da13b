//! Domain layer for the discovery console
//!
//! Session data model, view model, errors and the ports the services depend on.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DiscoveryError, ServiceError, StoreError};

//! Discovery Service port (trait) for dependency injection.
//!
//! The coordinator drives a remote strategy search exclusively through this
//! contract; the HTTP adapter and test doubles implement it.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::errors::ServiceError;
use crate::domain::models::{DiscoverySession, StartRequest, StartResponse};

/// Stream of session snapshots pushed by the service.
pub type SessionStream = BoxStream<'static, Result<DiscoverySession, ServiceError>>;

/// Remote collaborator that runs discovery searches
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    /// Starts a new search
    ///
    /// # Errors
    /// Returns `ServiceError::Rejected` with the service's message when the
    /// request is refused, or a transport error when it never got an answer.
    async fn start(&self, request: &StartRequest) -> Result<StartResponse, ServiceError>;

    /// Fetches the full snapshot of a session
    async fn status(&self, session_id: &str) -> Result<DiscoverySession, ServiceError>;

    /// Asks the service to stop a session (best-effort)
    async fn cancel(&self, session_id: &str) -> Result<(), ServiceError>;

    /// Opens a push channel delivering snapshots of a session
    ///
    /// Services without a push channel keep the default, which reports
    /// `ServiceError::Unsupported`.
    async fn subscribe(&self, session_id: &str) -> Result<SessionStream, ServiceError> {
        Err(ServiceError::Unsupported(format!(
            "push updates for session {session_id}"
        )))
    }
}

//! Domain errors for the discovery console.

use thiserror::Error;

use super::models::view::CoordinatorState;

/// Errors reported by a Discovery Service implementation.
///
/// Transport-agnostic so the coordinator can classify failures without knowing
/// whether they came from HTTP, a push channel or a test double.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service refused the request; `message` is its body verbatim
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The service does not know the requested session
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The service answered with a server-side error
    #[error("Service unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },

    /// The request never got an answer
    #[error("Transport error: {0}")]
    Transport(String),

    /// The answer could not be decoded
    #[error("Malformed response: {0}")]
    Decode(String),

    /// The service does not offer this operation
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl ServiceError {
    /// Returns true if retrying the same request later may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::Transport(_) | Self::Decode(_)
        )
    }

    /// Returns true if the service reported the session as unknown.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Errors raised by a session store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    #[error("Session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted record could not be decoded
    #[error("Session store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Errors returned by coordinator commands.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// `start` was called with a blank domain or URL
    #[error("A domain or URL is required")]
    EmptyTarget,

    /// The command is not valid in the current state
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        state: CoordinatorState,
        action: &'static str,
    },

    /// The service refused to start a search
    #[error("{0}")]
    StartRejected(String),

    /// The session store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ServiceError::Transport("connection refused".to_string()).is_transient());
        assert!(ServiceError::Decode("eof".to_string()).is_transient());
        assert!(ServiceError::Unavailable {
            status: 503,
            message: "busy".to_string()
        }
        .is_transient());

        assert!(!ServiceError::NotFound("abc".to_string()).is_transient());
        assert!(!ServiceError::Rejected {
            status: 409,
            message: "already running".to_string()
        }
        .is_transient());
        assert!(!ServiceError::Unsupported("push".to_string()).is_transient());
    }

    #[test]
    fn test_rejected_displays_body_verbatim() {
        let error = ServiceError::Rejected {
            status: 400,
            message: "domain is not resolvable".to_string(),
        };
        assert_eq!(error.to_string(), "domain is not resolvable");
    }

    #[test]
    fn test_invalid_transition_display() {
        let error = DiscoveryError::InvalidTransition {
            state: CoordinatorState::Running,
            action: "reset",
        };
        assert_eq!(error.to_string(), "Cannot reset while running");
    }
}

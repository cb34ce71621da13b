//! HTTP error mapping for the Discovery Service client.

use reqwest::StatusCode;

use crate::domain::errors::ServiceError;

/// Map a non-success response to a `ServiceError`.
///
/// - 404: the session is unknown
/// - 5xx: the daemon is up but cannot serve the request right now
/// - anything else: a refusal, carrying the body verbatim
pub fn from_status(status: StatusCode, body: String) -> ServiceError {
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body
    };

    if status == StatusCode::NOT_FOUND {
        ServiceError::NotFound(message)
    } else if status.is_server_error() {
        ServiceError::Unavailable {
            status: status.as_u16(),
            message,
        }
    } else {
        ServiceError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_404() {
        let error = from_status(StatusCode::NOT_FOUND, "session expired".to_string());
        assert_eq!(error, ServiceError::NotFound("session expired".to_string()));
        assert!(error.is_not_found());
    }

    #[test]
    fn test_from_status_5xx_is_transient() {
        for code in [500, 502, 503, 504] {
            let error = from_status(StatusCode::from_u16(code).unwrap(), "oops".to_string());
            assert!(matches!(error, ServiceError::Unavailable { .. }));
            assert!(error.is_transient());
        }
    }

    #[test]
    fn test_from_status_4xx_keeps_body_verbatim() {
        let error = from_status(
            StatusCode::CONFLICT,
            "  a discovery is already running\n".to_string(),
        );
        assert_eq!(
            error,
            ServiceError::Rejected {
                status: 409,
                message: "  a discovery is already running\n".to_string()
            }
        );
        assert_eq!(error.to_string(), "  a discovery is already running\n");
    }

    #[test]
    fn test_from_status_empty_body_uses_reason() {
        let error = from_status(StatusCode::BAD_REQUEST, "  ".to_string());
        assert_eq!(error.to_string(), "Bad Request");
    }

    #[test]
    fn test_from_serde_error() {
        let serde_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: ServiceError = serde_error.into();
        assert!(matches!(error, ServiceError::Decode(_)));
    }
}

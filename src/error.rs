//! Application error types and result alias.

use axum::{
    http::{header::WWW_AUTHENTICATE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// One failed attempt against a proxied upstream.
///
/// Retained inside [`AppError::UpstreamExhausted`] so the failure recorder
/// can report why every upstream in the chain was rejected, even though the
/// client only ever sees a plain 404.
#[derive(Debug, Clone)]
pub struct UpstreamAttempt {
    /// Configured upstream name
    pub upstream: String,
    /// Human-readable failure reason (status code or transport error)
    pub reason: String,
}

impl std::fmt::Display for UpstreamAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.upstream, self.reason)
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic authentication/authorization rejection.
    ///
    /// Unknown alias, wrong secret, out-of-scope path and malformed
    /// credentials all collapse into this one variant so the response never
    /// discloses which check failed. The concrete cause is logged before the
    /// variant is constructed.
    #[error("Unauthorized")]
    Unauthorized,

    /// Access denied for an authenticated caller
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Not found error
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict error (e.g., redeploy of a release artifact)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request path failed normalization (traversal segments, absolute escape)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Metadata synthesis over a directory with no recognizable artifacts
    #[error("No artifact files in version directory: {0}")]
    EmptyVersion(String),

    /// Every configured upstream was tried and none produced the artifact
    #[error("All upstreams exhausted for {path}")]
    UpstreamExhausted {
        path: String,
        attempts: Vec<UpstreamAttempt>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error should be captured by the failure recorder.
    ///
    /// Client-caused rejections (401/403/404/400/409) are expected traffic;
    /// only unexpected server-side failures and exhausted proxy chains carry
    /// diagnostic value for operators.
    pub fn is_recordable(&self) -> bool {
        matches!(
            self,
            AppError::Config(_)
                | AppError::Io(_)
                | AppError::Json(_)
                | AppError::Internal(_)
                | AppError::UpstreamExhausted { .. }
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "Configuration error".to_string(),
            ),
            // Deliberately uniform: no detail distinguishes the auth failure cause
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Unauthorized".to_string(),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            // The requested path is logged, never echoed; a probe cannot tell
            // a missing artifact from a repository it may not see
            AppError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Resource not found".to_string(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::InvalidPath(msg) => (StatusCode::BAD_REQUEST, "INVALID_PATH", msg.clone()),
            AppError::EmptyVersion(_) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Resource not found".to_string(),
            ),
            // Upstream failure detail stays internal; the client sees a plain 404
            AppError::UpstreamExhausted { .. } => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Resource not found".to_string(),
            ),
            AppError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                "IO operation failed".to_string(),
            ),
            AppError::Json(_) => (
                StatusCode::BAD_REQUEST,
                "JSON_ERROR",
                "Invalid JSON".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal error".to_string(),
            ),
        };

        // Log the error with full detail before it is flattened for the client
        tracing::error!(error = %self, code = code, "Request error");

        let body = Json(json!({
            "code": code,
            "message": message,
        }));

        if status == StatusCode::UNAUTHORIZED {
            // Maven/Gradle clients retry with credentials on a Basic challenge
            (
                status,
                [(WWW_AUTHENTICATE, "Basic realm=\"stockpile\"")],
                body,
            )
                .into_response()
        } else {
            (status, body).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_message_carries_no_detail() {
        // Anti-enumeration: the display form never names a cause
        assert_eq!(AppError::Unauthorized.to_string(), "Unauthorized");
    }

    #[test]
    fn test_upstream_exhausted_retains_attempts() {
        let err = AppError::UpstreamExhausted {
            path: "releases/com/example/app/1.0/app-1.0.jar".to_string(),
            attempts: vec![
                UpstreamAttempt {
                    upstream: "internal-mirror".to_string(),
                    reason: "404 Not Found".to_string(),
                },
                UpstreamAttempt {
                    upstream: "central".to_string(),
                    reason: "connection refused".to_string(),
                },
            ],
        };

        match err {
            AppError::UpstreamExhausted { attempts, .. } => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].to_string(), "internal-mirror: 404 Not Found");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_recordable_classification() {
        assert!(AppError::Internal("boom".into()).is_recordable());
        assert!(AppError::UpstreamExhausted {
            path: "p".into(),
            attempts: vec![]
        }
        .is_recordable());
        assert!(!AppError::Unauthorized.is_recordable());
        assert!(!AppError::NotFound("x".into()).is_recordable());
        assert!(!AppError::Conflict("x".into()).is_recordable());
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common_auth::AuthError;
use serde::Serialize;
use thiserror::Error;

use crate::policy::PolicyError;

/// Externally visible failure categories. Display strings stay terse; the
/// internal cause is kept as the error source for logs.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("unauthenticated")]
    Unauthenticated(#[source] AuthError),
    #[error("permission denied")]
    PermissionDenied(#[source] PolicyError),
    #[error("unable to issue token")]
    TokenIssue(#[source] AuthError),
}

impl SecurityError {
    pub fn code(&self) -> &'static str {
        match self {
            SecurityError::Unauthenticated(_) => "UNAUTHENTICATED",
            SecurityError::PermissionDenied(_) => "PERMISSION_DENIED",
            SecurityError::TokenIssue(_) => "TOKEN_ISSUE",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SecurityError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            SecurityError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            SecurityError::TokenIssue(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for SecurityError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn unauthenticated_hides_cause_in_display() {
        let err = SecurityError::Unauthenticated(AuthError::KeyNotFound("k9".into()));
        assert_eq!(err.to_string(), "unauthenticated");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        let source = err.source().expect("cause kept").to_string();
        assert!(source.contains("k9"));
    }

    #[test]
    fn permission_denied_maps_to_forbidden() {
        let err = SecurityError::PermissionDenied(PolicyError::UnknownRule("x".into()));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), "PERMISSION_DENIED");
    }
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::{auth::VerifyError, models::policy::Provider};

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Why an upload callback was rejected.
///
/// Every variant is terminal for the request. The `Display` text may carry
/// diagnostic detail for logs; [`CallbackError::public_message`] is what the
/// caller gets to see.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("missing key")]
    MissingKey,
    #[error("session missing or expired")]
    SessionExpiredOrMissing,
    #[error("user not found")]
    UserNotFound,
    #[error("policy provider `{policy}` does not accept `{route}` callbacks")]
    PolicyMismatch { policy: Provider, route: Provider },
    #[error(transparent)]
    Verify(#[from] VerifyError),
}

impl CallbackError {
    pub fn public_message(&self) -> String {
        match self {
            CallbackError::PolicyMismatch { .. } => {
                "storage policy does not accept this callback".into()
            }
            CallbackError::Verify(err) => err.public_message().into(),
            other => other.to_string(),
        }
    }

    /// Errors about the request parameters rather than its authenticity.
    pub fn is_parameter_error(&self) -> bool {
        matches!(
            self,
            CallbackError::MissingKey | CallbackError::SessionExpiredOrMissing
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_message_hides_provider_detail() {
        let err = CallbackError::Verify(VerifyError::BodyReadFailure(
            "length limit exceeded".into(),
        ));
        assert_eq!(err.public_message(), "unable to read callback body");
        assert!(err.to_string().contains("length limit exceeded"));
    }

    #[test]
    fn parameter_errors_are_the_session_lookups() {
        assert!(CallbackError::MissingKey.is_parameter_error());
        assert!(CallbackError::SessionExpiredOrMissing.is_parameter_error());
        assert!(!CallbackError::UserNotFound.is_parameter_error());
        assert!(!CallbackError::Verify(VerifyError::SignatureMismatch).is_parameter_error());
    }
}

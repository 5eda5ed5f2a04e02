//! Response payloads produced by the callback layer.
//!
//! Slave nodes and first-party clients read the generic envelope, which is
//! always served with HTTP 200 and carries the real outcome in `code`.
//! Third-party providers get a 401 with `{ "error": ... }` so their retry
//! logic sees a failed callback.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;

use super::policy::Provider;
use crate::errors::CallbackError;

pub const CODE_OK: i32 = 0;
pub const CODE_CHECK_LOGIN: i32 = 401;
pub const CODE_PARAM_ERR: i32 = 40001;

/// Generic `{ code, message }` envelope.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            code: CODE_OK,
            message: String::new(),
            data,
        }
    }

    pub fn err(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Error body third-party storage providers understand.
#[derive(Debug, Serialize)]
pub struct ProviderFailure {
    pub error: String,
}

/// A rejected callback, ready to be sent back to whoever made it.
#[derive(Debug)]
pub struct Rejection {
    pub reason: String,
    pub status: StatusCode,
    pub body: Value,
}

impl Rejection {
    /// Shape the rejection the way the provider behind `route` expects it.
    pub fn for_route(route: Provider, err: &CallbackError) -> Self {
        let reason = err.public_message();
        match route {
            Provider::Remote | Provider::Local => {
                let code = if err.is_parameter_error() {
                    CODE_PARAM_ERR
                } else {
                    CODE_CHECK_LOGIN
                };
                Self {
                    status: StatusCode::OK,
                    body: serde_json::json!(Envelope::err(code, reason.clone())),
                    reason,
                }
            }
            _ => Self {
                status: StatusCode::UNAUTHORIZED,
                body: serde_json::json!(ProviderFailure {
                    error: reason.clone()
                }),
                reason,
            },
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::VerifyError;

    #[test]
    fn remote_rejections_use_the_envelope() {
        let rejection = Rejection::for_route(Provider::Remote, &CallbackError::MissingKey);
        assert_eq!(rejection.status, StatusCode::OK);
        assert_eq!(rejection.body["code"], CODE_PARAM_ERR);
        assert_eq!(rejection.body["message"], "missing key");

        let rejection = Rejection::for_route(
            Provider::Remote,
            &CallbackError::Verify(VerifyError::SignatureMismatch),
        );
        assert_eq!(rejection.body["code"], CODE_CHECK_LOGIN);
    }

    #[test]
    fn provider_rejections_are_401_with_error_field() {
        let rejection = Rejection::for_route(
            Provider::Upyun,
            &CallbackError::Verify(VerifyError::ContentIntegrityMismatch),
        );
        assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
        assert_eq!(rejection.body["error"], "content integrity check failed");
        assert!(rejection.body.get("code").is_none());
    }
}

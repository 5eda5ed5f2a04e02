//! Guard for first-party endpoints signed with the node secret.

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::{
    auth::{CallbackRequest, hmac::check_request},
    body::ReplayableBody,
    models::response::{CODE_CHECK_LOGIN, Envelope},
    state::NodeAuth,
};

/// Rejects requests not signed with the node secret.
///
/// Failures are answered with HTTP 200 and the generic envelope, the same
/// way slave nodes report every other error.
pub async fn sign_required(State(node): State<NodeAuth>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let result = match ReplayableBody::buffer(body, node.max_body_bytes).await {
        Ok(body) => {
            let checked = check_request(&node.auth, &CallbackRequest::new(&parts, &body));
            checked.map(|_| body)
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(body) => next.run(Request::from_parts(parts, body.replay())).await,
        Err(err) => {
            debug!(path = %parts.uri.path(), error = %err, "Rejected unsigned request");
            (
                StatusCode::OK,
                Json(Envelope::err(CODE_CHECK_LOGIN, err.public_message())),
            )
                .into_response()
        }
    }
}

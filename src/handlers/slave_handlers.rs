//! First-party endpoints guarded by the node signature.

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use crate::{
    errors::AppError,
    models::{
        response::Envelope,
        session::{CallbackSession, UploadMetadata},
    },
    services::session_store::{MAX_SESSION_TTL, SessionStoreError},
    state::AppState,
};

/// `GET|POST /api/v3/slave/ping`
pub async fn ping() -> Json<Envelope> {
    Json(Envelope::ok(Some(json!(env!("CARGO_PKG_VERSION")))))
}

/// Request body for `POST /api/v3/slave/callback-sessions`.
#[derive(Debug, Deserialize)]
pub struct IssueSessionReq {
    pub user_id: i64,
    pub policy_id: i64,
    #[serde(flatten)]
    pub metadata: UploadMetadata,
    /// Overrides the configured session TTL.
    pub ttl_secs: Option<u64>,
}

/// `POST /api/v3/slave/callback-sessions`: issue the one-time callback key
/// for an upload that is about to start.
pub async fn issue_session(
    State(state): State<AppState>,
    Json(req): Json<IssueSessionReq>,
) -> Result<Json<Envelope>, AppError> {
    if req.user_id <= 0 || req.policy_id <= 0 {
        return Err(AppError::bad_request("user_id and policy_id must be positive"));
    }

    let ttl = req
        .ttl_secs
        .map(Duration::from_secs)
        .unwrap_or(state.session_ttl);
    if ttl.is_zero() || ttl > MAX_SESSION_TTL {
        return Err(AppError::bad_request(format!(
            "ttl_secs must be between 1 and {}",
            MAX_SESSION_TTL.as_secs()
        )));
    }
    let session = CallbackSession::new(req.user_id, req.policy_id, req.metadata);
    let key = session.key.clone();

    state
        .sessions
        .put(session, ttl)
        .await
        .map_err(|err| match err {
            SessionStoreError::InvalidTtl(_) => AppError::bad_request(err.to_string()),
        })?;

    info!(user_id = req.user_id, ttl_secs = ttl.as_secs(), "Issued callback session");
    Ok(Json(Envelope::ok(Some(json!({
        "key": key,
        "ttl": ttl.as_secs(),
    })))))
}

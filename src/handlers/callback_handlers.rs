//! Handlers that run after a callback has been authenticated.
//!
//! Persisting the uploaded file belongs to the file system layer; these
//! handlers acknowledge the callback in the shape each provider expects.

use axum::Json;
use serde_json::json;
use tracing::info;

use crate::{models::response::Envelope, services::dispatcher::CallbackContext};

/// `POST /api/v3/callback/{provider}/{key}`
pub async fn complete_upload(ctx: CallbackContext) -> Json<Envelope> {
    let meta = &ctx.session.metadata;
    info!(
        user_id = ctx.user.id,
        policy = %ctx.user.policy.provider,
        path = %meta.virtual_path,
        name = %meta.name,
        size = meta.size,
        "Upload completed"
    );

    Json(Envelope::ok(Some(json!({
        "path": meta.virtual_path,
        "name": meta.name,
        "size": meta.size,
    }))))
}

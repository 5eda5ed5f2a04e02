//! Defines routes for upload callbacks and signed first-party endpoints.
//!
//! ## Structure
//! - **Provider callbacks**, each behind [`callback_auth`] for its provider
//!   - `POST /api/v3/callback/remote/{key}`
//!   - `POST /api/v3/callback/qiniu/{key}`
//!   - `POST /api/v3/callback/oss/{key}`
//!   - `POST /api/v3/callback/upyun/{key}`
//!   - `POST /api/v3/callback/onedrive/finish/{key}`
//!   - `GET  /api/v3/callback/cos/{key}`
//!
//! - **Signed endpoints**, behind [`sign_required`]
//!   - `GET|POST /api/v3/slave/ping`
//!   - `POST     /api/v3/slave/callback-sessions`

use crate::{
    handlers::{
        callback_handlers::complete_upload,
        health_handlers::{healthz, readyz},
        slave_handlers::{issue_session, ping},
    },
    middleware::{
        callback::{CallbackRoute, callback_auth},
        sign::sign_required,
    },
    models::policy::Provider,
    state::AppState,
};
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{MethodRouter, get, post},
};

/// Build the router for every endpoint the gateway serves.
pub fn routes(state: &AppState) -> Router<AppState> {
    let callbacks = Router::new()
        .merge(callback_route(
            state,
            "/api/v3/callback/remote/{key}",
            Provider::Remote,
            post(complete_upload),
        ))
        .merge(callback_route(
            state,
            "/api/v3/callback/qiniu/{key}",
            Provider::Qiniu,
            post(complete_upload),
        ))
        .merge(callback_route(
            state,
            "/api/v3/callback/oss/{key}",
            Provider::Oss,
            post(complete_upload),
        ))
        .merge(callback_route(
            state,
            "/api/v3/callback/upyun/{key}",
            Provider::Upyun,
            post(complete_upload),
        ))
        .merge(callback_route(
            state,
            "/api/v3/callback/onedrive/finish/{key}",
            Provider::OneDrive,
            post(complete_upload),
        ))
        .merge(callback_route(
            state,
            "/api/v3/callback/cos/{key}",
            Provider::Cos,
            get(complete_upload),
        ));

    let signed = Router::new()
        .route("/api/v3/slave/ping", get(ping).post(ping))
        .route("/api/v3/slave/callback-sessions", post(issue_session))
        .route_layer(from_fn_with_state(state.node_auth.clone(), sign_required));

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .merge(callbacks)
        .merge(signed)
}

fn callback_route(
    state: &AppState,
    path: &str,
    provider: Provider,
    handler: MethodRouter<AppState>,
) -> Router<AppState> {
    let route = CallbackRoute {
        dispatcher: state.dispatcher.clone(),
        provider,
    };
    Router::new()
        .route(path, handler)
        .route_layer(from_fn_with_state(route, callback_auth))
}

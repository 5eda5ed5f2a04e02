//! Upload callback authentication middleware.

use axum::{
    extract::{FromRequestParts, Path, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use crate::{
    errors::AppError,
    models::{policy::Provider, response::Rejection},
    services::dispatcher::{CallbackContext, CallbackDispatcher},
};

/// Middleware state for one provider's callback endpoint.
#[derive(Clone)]
pub struct CallbackRoute {
    pub dispatcher: Arc<CallbackDispatcher>,
    pub provider: Provider,
}

/// Authenticates the callback for the `{key}` path parameter.
///
/// Accepted requests continue with a [`CallbackContext`] in their
/// extensions; everything else is answered here in the provider's error
/// shape.
pub async fn callback_auth(
    State(route): State<CallbackRoute>,
    Path(params): Path<HashMap<String, String>>,
    request: Request,
    next: Next,
) -> Response {
    let key = params.get("key").map(String::as_str).unwrap_or_default();

    match route.dispatcher.dispatch(route.provider, key, request).await {
        Ok(request) => next.run(request).await,
        Err(err) => {
            debug!(provider = %route.provider, error = %err, "Rejected upload callback");
            Rejection::for_route(route.provider, &err).into_response()
        }
    }
}

impl<S> FromRequestParts<S> for CallbackContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallbackContext>()
            .cloned()
            .ok_or_else(|| AppError::internal("handler is not behind callback authentication"))
    }
}

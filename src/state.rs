//! Shared application state handed to every handler.

use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};

use crate::{
    auth::{VerifierDeps, hmac::HmacAuth, oss::PublicKeySource},
    config::AppConfig,
    services::{
        credentials::CredentialResolver, dispatcher::CallbackDispatcher,
        session_store::CallbackSessionStore, signals::CompletionSignals, user_store::UserStore,
    },
};

/// Signature check applied to first-party signed endpoints.
#[derive(Clone)]
pub struct NodeAuth {
    pub auth: Arc<HmacAuth>,
    pub max_body_bytes: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub sessions: Arc<dyn CallbackSessionStore>,
    pub signals: Arc<CompletionSignals>,
    pub dispatcher: Arc<CallbackDispatcher>,
    pub node_auth: NodeAuth,
    pub session_ttl: Duration,
}

impl AppState {
    pub fn new(
        cfg: &AppConfig,
        db: Arc<SqlitePool>,
        sessions: Arc<dyn CallbackSessionStore>,
        users: Arc<dyn UserStore>,
        public_keys: Arc<dyn PublicKeySource>,
    ) -> Self {
        let signals = Arc::new(CompletionSignals::default());
        let dispatcher = CallbackDispatcher::new(
            sessions.clone(),
            CredentialResolver::new(users),
            VerifierDeps {
                public_keys,
                signals: signals.clone(),
            },
            cfg.max_body_bytes,
        );

        Self {
            db,
            sessions,
            signals,
            dispatcher: Arc::new(dispatcher),
            node_auth: NodeAuth {
                auth: Arc::new(HmacAuth::new(&cfg.node_secret)),
                max_body_bytes: cfg.max_body_bytes,
            },
            session_ttl: cfg.session_ttl,
        }
    }
}

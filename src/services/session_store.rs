//! Callback session storage.
//!
//! Sessions are written when an upload starts and taken exactly once when
//! the provider calls back. `take` is the only operation the callback path
//! uses, and it must be atomic: two concurrent callbacks with the same key
//! see at most one session between them.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use crate::models::session::CallbackSession;

/// Longest lifetime a callback session may be issued with.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session ttl of {}s is out of range", .0.as_secs())]
    InvalidTtl(Duration),
}

#[async_trait]
pub trait CallbackSessionStore: Send + Sync {
    /// Store `session` under its key for `ttl`, replacing any previous one.
    async fn put(&self, session: CallbackSession, ttl: Duration) -> Result<(), SessionStoreError>;

    /// Remove and return the live session for `key`.
    async fn take(&self, key: &str) -> Result<Option<CallbackSession>, SessionStoreError>;

    /// Drop expired sessions, returning how many were removed.
    async fn purge_expired(&self) -> usize;
}

struct StoredSession {
    session: CallbackSession,
    expires_at: Instant,
}

/// In-process session store.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: DashMap<String, StoredSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CallbackSessionStore for MemorySessionStore {
    async fn put(&self, session: CallbackSession, ttl: Duration) -> Result<(), SessionStoreError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or(SessionStoreError::InvalidTtl(ttl))?;
        self.entries.insert(
            session.key.clone(),
            StoredSession {
                session,
                expires_at,
            },
        );
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<CallbackSession>, SessionStoreError> {
        match self.entries.remove(key) {
            Some((_, stored)) if stored.expires_at > Instant::now() => Ok(Some(stored.session)),
            Some(_) => {
                debug!(key, "Dropped expired callback session");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, stored| stored.expires_at > now);
        before.saturating_sub(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::UploadMetadata;
    use std::sync::Arc;

    fn session() -> CallbackSession {
        CallbackSession::new(
            1,
            1,
            UploadMetadata {
                virtual_path: "/docs".into(),
                name: "a.txt".into(),
                size: 3,
                save_key: None,
            },
        )
    }

    #[tokio::test]
    async fn take_returns_the_session_once() {
        let store = MemorySessionStore::new();
        let session = session();
        let key = session.key.clone();
        store.put(session.clone(), Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.take(&key).await.unwrap(), Some(session));
        assert_eq!(store.take(&key).await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn expired_sessions_are_not_found() {
        let store = MemorySessionStore::new();
        let session = session();
        let key = session.key.clone();
        store.put(session, Duration::ZERO).await.unwrap();

        assert_eq!(store.take(&key).await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unrepresentable_ttl_is_refused() {
        let store = MemorySessionStore::new();
        let err = store.put(session(), Duration::MAX).await.unwrap_err();
        assert!(matches!(err, SessionStoreError::InvalidTtl(ttl) if ttl == Duration::MAX));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let store = MemorySessionStore::new();
        assert_eq!(store.take("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn purge_keeps_live_sessions() {
        let store = MemorySessionStore::new();
        let live = session();
        let live_key = live.key.clone();
        store.put(live, Duration::from_secs(60)).await.unwrap();
        store.put(session(), Duration::ZERO).await.unwrap();
        store.put(session(), Duration::ZERO).await.unwrap();

        assert_eq!(store.purge_expired().await, 2);
        assert_eq!(store.len(), 1);
        assert!(store.take(&live_key).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_takes_have_one_winner() {
        let store = Arc::new(MemorySessionStore::new());
        let session = session();
        let key = session.key.clone();
        store.put(session, Duration::from_secs(60)).await.unwrap();

        let handles = (0..32).map(|_| {
            let store = store.clone();
            let key = key.clone();
            tokio::spawn(async move { store.take(&key).await.unwrap() })
        });
        let results = futures::future::join_all(handles).await;

        let winners = results
            .into_iter()
            .map(|r| r.unwrap())
            .filter(Option::is_some)
            .count();
        assert_eq!(winners, 1);
    }
}

//! The callback dispatcher: from an inbound callback to an accept/reject
//! decision.
//!
//! 1. the key must be non-empty
//! 2. the session for the key is taken (and so consumed) from the store
//! 3. the session user must resolve to an active user
//! 4. the user's policy must belong to the provider whose endpoint was hit
//! 5. the policy's verifier must accept the request
//!
//! Any failure rejects. An accepted request is rebuilt around its buffered
//! body with a [`CallbackContext`] in its extensions.

use axum::extract::Request;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{credentials::CredentialResolver, session_store::CallbackSessionStore};
use crate::{
    auth::{CallbackRequest, Verifier, VerifierDeps},
    body::ReplayableBody,
    errors::CallbackError,
    models::{policy::Provider, session::CallbackSession, user::User},
};

/// What downstream handlers learn about an accepted callback.
#[derive(Debug, Clone)]
pub struct CallbackContext {
    pub user: User,
    pub session: CallbackSession,
}

pub struct CallbackDispatcher {
    sessions: Arc<dyn CallbackSessionStore>,
    credentials: CredentialResolver,
    deps: VerifierDeps,
    max_body_bytes: usize,
}

impl CallbackDispatcher {
    pub fn new(
        sessions: Arc<dyn CallbackSessionStore>,
        credentials: CredentialResolver,
        deps: VerifierDeps,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            sessions,
            credentials,
            deps,
            max_body_bytes,
        }
    }

    /// Authenticate a callback that arrived on `route`'s endpoint for `key`.
    pub async fn dispatch(
        &self,
        route: Provider,
        key: &str,
        request: Request,
    ) -> Result<Request, CallbackError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(CallbackError::MissingKey);
        }

        let session = match self.sessions.take(key).await {
            Ok(Some(session)) => session,
            Ok(None) => return Err(CallbackError::SessionExpiredOrMissing),
            Err(err) => {
                warn!(error = %err, "Callback session lookup failed");
                return Err(CallbackError::SessionExpiredOrMissing);
            }
        };

        let (user, policy) = self.credentials.resolve(session.user_id).await?;

        if policy.provider != route {
            return Err(CallbackError::PolicyMismatch {
                policy: policy.provider,
                route,
            });
        }
        let verifier = Verifier::for_policy(&policy, &self.deps).ok_or(
            CallbackError::PolicyMismatch {
                policy: policy.provider,
                route,
            },
        )?;

        let (parts, body) = request.into_parts();
        let body = ReplayableBody::buffer(body, self.max_body_bytes).await?;

        if let Err(err) = verifier
            .verify(key, &CallbackRequest::new(&parts, &body))
            .await
        {
            if err.is_malformed_input() {
                warn!(provider = %route, user_id = user.id, error = %err, "Callback could not be verified");
            } else {
                debug!(provider = %route, user_id = user.id, error = %err, "Callback signature rejected");
            }
            return Err(err.into());
        }

        info!(
            provider = %route,
            user_id = user.id,
            file = %session.metadata.name,
            "Upload callback accepted"
        );

        let mut request = Request::from_parts(parts, body.replay());
        request
            .extensions_mut()
            .insert(CallbackContext { user, session });
        Ok(request)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        auth::{
            VerifyError,
            oss::PublicKeySource,
            vendor::MacError,
        },
        models::{
            policy::{Secret, StoragePolicy},
            session::UploadMetadata,
            user::UserStatus,
        },
        services::{
            session_store::MemorySessionStore,
            signals::CompletionSignals,
            user_store::{UserStore, UserStoreError},
        },
    };
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use md5::{Digest, Md5};
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    pub(crate) struct NoKeys;

    #[async_trait]
    impl PublicKeySource for NoKeys {
        async fn fetch(&self, _url: &str) -> Result<String, MacError> {
            Err(MacError::KeyFetch("no keys in tests".into()))
        }
    }

    #[derive(Default)]
    struct FakeUsers {
        users: HashMap<i64, User>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl UserStore for FakeUsers {
        async fn get_active_user_by_id(&self, id: i64) -> Result<Option<User>, UserStoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .users
                .get(&id)
                .filter(|u| u.status == UserStatus::Active)
                .cloned())
        }
    }

    fn user(id: i64, status: UserStatus, provider: Provider) -> User {
        User {
            id,
            email: format!("user{id}@example.com"),
            nickname: "tester".into(),
            status,
            policy: StoragePolicy {
                id: 10,
                name: "test".into(),
                provider,
                server: None,
                access_key: Secret::new("operator"),
                secret_key: Secret::new("password"),
            },
        }
    }

    struct Harness {
        dispatcher: CallbackDispatcher,
        sessions: Arc<MemorySessionStore>,
        users: Arc<FakeUsers>,
        signals: Arc<CompletionSignals>,
    }

    fn harness(users: Vec<User>) -> Harness {
        let sessions = Arc::new(MemorySessionStore::new());
        let users = Arc::new(FakeUsers {
            users: users.into_iter().map(|u| (u.id, u)).collect(),
            ..Default::default()
        });
        let signals = Arc::new(CompletionSignals::default());
        let dispatcher = CallbackDispatcher::new(
            sessions.clone(),
            CredentialResolver::new(users.clone()),
            VerifierDeps {
                public_keys: Arc::new(NoKeys),
                signals: signals.clone(),
            },
            1024 * 1024,
        );
        Harness {
            dispatcher,
            sessions,
            users,
            signals,
        }
    }

    async fn issue(sessions: &MemorySessionStore, user_id: i64) -> String {
        let session = CallbackSession::new(
            user_id,
            10,
            UploadMetadata {
                virtual_path: "/".into(),
                name: "a.txt".into(),
                size: 8,
                save_key: None,
            },
        );
        let key = session.key.clone();
        sessions.put(session, Duration::from_secs(60)).await.unwrap();
        key
    }

    fn upyun_request(key: &str, body: &'static [u8], authorization: Option<String>) -> Request {
        let path = format!("/api/v3/callback/upyun/{key}");
        let date = "Wed, 18 Oct 2026 08:00:00 GMT";
        let md5 = hex::encode(Md5::digest(body));
        let authorization = authorization.unwrap_or_else(|| {
            crate::auth::upyun::UpyunVerifier::new(Secret::new("operator"), Secret::new("password"))
                .sign(&["POST", &path, date, &md5])
        });
        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-md5", md5)
            .header("date", date)
            .header("authorization", authorization)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn empty_key_is_rejected() {
        let h = harness(vec![]);
        let err = h
            .dispatcher
            .dispatch(Provider::Cos, "  ", Request::new(Body::empty()))
            .await
            .unwrap_err();
        assert!(matches!(err, CallbackError::MissingKey));
    }

    #[tokio::test]
    async fn unknown_key_is_rejected_without_user_lookup() {
        let h = harness(vec![user(1, UserStatus::Active, Provider::Cos)]);
        let err = h
            .dispatcher
            .dispatch(Provider::Cos, "unknown", Request::new(Body::empty()))
            .await
            .unwrap_err();
        assert!(matches!(err, CallbackError::SessionExpiredOrMissing));
        assert_eq!(err.to_string(), "session missing or expired");
        assert_eq!(h.users.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn inactive_user_is_rejected_and_session_stays_consumed() {
        let h = harness(vec![user(1, UserStatus::Banned, Provider::Cos)]);
        let key = issue(&h.sessions, 1).await;

        let err = h
            .dispatcher
            .dispatch(Provider::Cos, &key, Request::new(Body::empty()))
            .await
            .unwrap_err();
        assert!(matches!(err, CallbackError::UserNotFound));
        assert_eq!(h.users.lookups.load(Ordering::SeqCst), 1);
        assert!(h.sessions.take(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn genuine_upyun_callback_is_accepted_with_context() {
        let h = harness(vec![user(7, UserStatus::Active, Provider::Upyun)]);
        let key = issue(&h.sessions, 7).await;

        let request = h
            .dispatcher
            .dispatch(Provider::Upyun, &key, upyun_request(&key, b"code=200", None))
            .await
            .unwrap();

        let ctx = request.extensions().get::<CallbackContext>().unwrap().clone();
        assert_eq!(ctx.user.id, 7);
        assert_eq!(ctx.session.key, key);

        let body = to_bytes(request.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"code=200");
    }

    #[tokio::test]
    async fn tampered_upyun_signature_is_rejected() {
        let h = harness(vec![user(7, UserStatus::Active, Provider::Upyun)]);
        let key = issue(&h.sessions, 7).await;

        let err = h
            .dispatcher
            .dispatch(
                Provider::Upyun,
                &key,
                upyun_request(&key, b"code=200", Some("UPYUN operator:forged".into())),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CallbackError::Verify(VerifyError::SignatureMismatch)
        ));
    }

    #[tokio::test]
    async fn replayed_callback_is_rejected() {
        let h = harness(vec![user(7, UserStatus::Active, Provider::Upyun)]);
        let key = issue(&h.sessions, 7).await;

        h.dispatcher
            .dispatch(Provider::Upyun, &key, upyun_request(&key, b"code=200", None))
            .await
            .unwrap();
        let err = h
            .dispatcher
            .dispatch(Provider::Upyun, &key, upyun_request(&key, b"code=200", None))
            .await
            .unwrap_err();
        assert!(matches!(err, CallbackError::SessionExpiredOrMissing));
    }

    #[tokio::test]
    async fn policy_for_another_provider_is_rejected() {
        let h = harness(vec![user(3, UserStatus::Active, Provider::Upyun)]);
        let key = issue(&h.sessions, 3).await;

        let err = h
            .dispatcher
            .dispatch(Provider::Cos, &key, Request::new(Body::empty()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CallbackError::PolicyMismatch {
                policy: Provider::Upyun,
                route: Provider::Cos
            }
        ));
    }

    #[tokio::test]
    async fn onedrive_callback_fires_completion_signal() {
        let h = harness(vec![user(5, UserStatus::Active, Provider::OneDrive)]);
        let key = issue(&h.sessions, 5).await;
        let waiter = h.signals.subscribe(&key);

        h.dispatcher
            .dispatch(Provider::OneDrive, &key, Request::new(Body::empty()))
            .await
            .unwrap();
        assert!(waiter.await.is_ok());
    }

    #[tokio::test]
    async fn oss_key_fetch_failure_fails_closed() {
        let h = harness(vec![user(9, UserStatus::Active, Provider::Oss)]);
        let key = issue(&h.sessions, 9).await;

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/v3/callback/oss/{key}"))
            .header(
                "x-oss-pub-key-url",
                "aHR0cHM6Ly9nb3NzcHVibGljLmFsaWNkbi5jb20va2V5LnBlbQ==",
            )
            .header("authorization", "c2ln")
            .body(Body::empty())
            .unwrap();
        let err = h
            .dispatcher
            .dispatch(Provider::Oss, &key, request)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CallbackError::Verify(VerifyError::Provider(MacError::KeyFetch(_)))
        ));
    }

    #[tokio::test]
    async fn oversized_body_is_a_read_failure() {
        let h = harness(vec![user(2, UserStatus::Active, Provider::Cos)]);
        let key = issue(&h.sessions, 2).await;
        let dispatcher = CallbackDispatcher::new(
            h.sessions.clone(),
            CredentialResolver::new(h.users.clone()),
            VerifierDeps {
                public_keys: Arc::new(NoKeys),
                signals: h.signals.clone(),
            },
            4,
        );

        let err = dispatcher
            .dispatch(Provider::Cos, &key, Request::new(Body::from("too large")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CallbackError::Verify(VerifyError::BodyReadFailure(_))
        ));
    }
}

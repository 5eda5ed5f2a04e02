//! Callback signature verification.
//!
//! One verifier per provider scheme:
//! - [`hmac`]: the shared-secret request signer used by slave nodes and the
//!   first-party signed API.
//! - [`vendor`]: delegation to a provider MAC primitive ([`qiniu`], [`oss`]).
//! - [`upyun`]: body digest check followed by a header signature check.
//! - [`passthrough`]: providers whose callbacks carry no signature at all.
//!
//! A [`Verifier`] is built once from a storage policy and carries that
//! policy's credentials.

pub mod hmac;
pub mod oss;
pub mod passthrough;
pub mod qiniu;
pub mod upyun;
pub mod vendor;

use axum::http::{HeaderMap, Method, Uri, request::Parts};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    body::ReplayableBody,
    models::policy::{Provider, StoragePolicy},
    services::signals::CompletionSignals,
};

use self::{
    hmac::HmacAuth,
    oss::{OssCallbackMac, PublicKeySource},
    passthrough::PassThroughVerifier,
    qiniu::QboxMac,
    upyun::UpyunVerifier,
    vendor::{MacError, VendorMacVerifier},
};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("failed to read request body: {0}")]
    BodyReadFailure(String),
    #[error("content integrity check failed")]
    ContentIntegrityMismatch,
    #[error("authentication failed")]
    SignatureMismatch,
    #[error("signature expired")]
    SignatureExpired,
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    #[error("provider verification error: {0}")]
    Provider(#[from] MacError),
}

impl VerifyError {
    pub fn public_message(&self) -> &'static str {
        match self {
            VerifyError::BodyReadFailure(_) => "unable to read callback body",
            VerifyError::ContentIntegrityMismatch => "content integrity check failed",
            VerifyError::SignatureMismatch => "authentication failed",
            VerifyError::SignatureExpired => "signature expired",
            VerifyError::MalformedSignature(_) => "malformed signature",
            VerifyError::Provider(_) => "unable to verify callback request",
        }
    }

    /// Failures caused by the input or the environment rather than a
    /// signature that simply did not match.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            VerifyError::BodyReadFailure(_)
                | VerifyError::MalformedSignature(_)
                | VerifyError::Provider(_)
        )
    }
}

/// Borrowed view of a callback request with its body already buffered.
#[derive(Debug, Clone, Copy)]
pub struct CallbackRequest<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
    pub body: &'a ReplayableBody,
}

impl<'a> CallbackRequest<'a> {
    pub fn new(parts: &'a Parts, body: &'a ReplayableBody) -> Self {
        Self {
            method: &parts.method,
            uri: &parts.uri,
            headers: &parts.headers,
            body,
        }
    }

    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Path plus `?query` when the request has one.
    pub fn path_and_query(&self) -> String {
        match self.uri.query() {
            Some(query) if !query.is_empty() => format!("{}?{}", self.uri.path(), query),
            _ => self.uri.path().to_string(),
        }
    }
}

/// Shared collaborators some verifiers need beyond the policy credentials.
#[derive(Clone)]
pub struct VerifierDeps {
    pub public_keys: Arc<dyn PublicKeySource>,
    pub signals: Arc<CompletionSignals>,
}

/// The verification scheme for one storage policy.
pub enum Verifier {
    Hmac(HmacAuth),
    VendorMac(VendorMacVerifier),
    ContentHash(UpyunVerifier),
    PassThrough(PassThroughVerifier),
}

impl Verifier {
    /// Build the verifier for `policy`. Local policies never receive
    /// callbacks and get none.
    pub fn for_policy(policy: &StoragePolicy, deps: &VerifierDeps) -> Option<Self> {
        let verifier = match policy.provider {
            Provider::Local => return None,
            Provider::Remote => Verifier::Hmac(HmacAuth::new(policy.secret_key.expose())),
            Provider::Qiniu => Verifier::VendorMac(VendorMacVerifier::new(QboxMac::new(
                policy.access_key.clone(),
                policy.secret_key.clone(),
            ))),
            Provider::Oss => Verifier::VendorMac(VendorMacVerifier::new(OssCallbackMac::new(
                deps.public_keys.clone(),
            ))),
            Provider::Upyun => Verifier::ContentHash(UpyunVerifier::new(
                policy.access_key.clone(),
                policy.secret_key.clone(),
            )),
            Provider::OneDrive => {
                Verifier::PassThrough(PassThroughVerifier::with_signals(deps.signals.clone()))
            }
            Provider::Cos => Verifier::PassThrough(PassThroughVerifier::silent()),
        };
        Some(verifier)
    }

    /// Check `request`, which arrived for the consumed callback `key`.
    pub async fn verify(&self, key: &str, request: &CallbackRequest<'_>) -> Result<(), VerifyError> {
        match self {
            Verifier::Hmac(auth) => hmac::check_request(auth, request),
            Verifier::VendorMac(verifier) => verifier.verify(request).await,
            Verifier::ContentHash(verifier) => verifier.verify(request),
            Verifier::PassThrough(verifier) => {
                verifier.complete(key);
                Ok(())
            }
        }
    }
}

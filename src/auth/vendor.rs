//! Delegation to provider-specific callback MAC primitives.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::{CallbackRequest, VerifyError};

/// Failure to compute a provider's verification, as opposed to a signature
/// that was computed and did not match.
#[derive(Debug, Error)]
pub enum MacError {
    #[error("missing header `{0}`")]
    MissingHeader(&'static str),
    #[error("malformed header `{header}`: {reason}")]
    MalformedHeader { header: &'static str, reason: String },
    #[error("policy credentials are incomplete")]
    MissingCredentials,
    #[error("public key url `{0}` is not trusted")]
    UntrustedKeyUrl(String),
    #[error("failed to fetch public key: {0}")]
    KeyFetch(String),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
}

/// A provider's own callback verification primitive.
///
/// `Ok(false)` means the callback is not authentic; `Err` means it could not
/// be checked at all.
#[async_trait]
pub trait CallbackMac: Send + Sync {
    async fn verify_callback(&self, request: &CallbackRequest<'_>) -> Result<bool, MacError>;
}

/// Runs a [`CallbackMac`] and treats anything short of `Ok(true)` as a
/// rejection.
pub struct VendorMacVerifier {
    mac: Box<dyn CallbackMac>,
}

impl VendorMacVerifier {
    pub fn new(mac: impl CallbackMac + 'static) -> Self {
        Self { mac: Box::new(mac) }
    }

    pub async fn verify(&self, request: &CallbackRequest<'_>) -> Result<(), VerifyError> {
        match self.mac.verify_callback(request).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(VerifyError::SignatureMismatch),
            Err(err) => {
                debug!(error = %err, "Unable to verify callback request");
                Err(VerifyError::Provider(err))
            }
        }
    }
}

//! Qiniu QBox callback MAC.
//!
//! `Authorization: QBox <access_key>:<base64url(HMAC-SHA1(secret_key, data))>`
//! where `data` is the path (plus `?query`) and a newline, followed by the
//! body when it is form-urlencoded.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::{
    CallbackRequest,
    vendor::{CallbackMac, MacError},
};
use crate::models::policy::Secret;

type HmacSha1 = Hmac<Sha1>;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

pub struct QboxMac {
    access_key: Secret,
    secret_key: Secret,
}

impl QboxMac {
    pub fn new(access_key: Secret, secret_key: Secret) -> Self {
        Self {
            access_key,
            secret_key,
        }
    }

    /// The `<access_key>:<signature>` token for `request`.
    pub fn sign_request(&self, request: &CallbackRequest<'_>) -> Result<String, MacError> {
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(MacError::MissingCredentials);
        }

        let mut mac = HmacSha1::new_from_slice(self.secret_key.expose().as_bytes())
            .map_err(|_| MacError::MissingCredentials)?;
        mac.update(request.path_and_query().as_bytes());
        mac.update(b"\n");
        if request.header("content-type") == Some(FORM_CONTENT_TYPE) {
            mac.update(request.body.as_bytes());
        }
        let sign = URL_SAFE.encode(mac.finalize().into_bytes());
        Ok(format!("{}:{}", self.access_key.expose(), sign))
    }
}

#[async_trait]
impl CallbackMac for QboxMac {
    async fn verify_callback(&self, request: &CallbackRequest<'_>) -> Result<bool, MacError> {
        let Some(auth) = request.header("authorization").filter(|a| !a.is_empty()) else {
            return Ok(false);
        };
        let token = self.sign_request(request)?;
        Ok(auth == format!("QBox {token}"))
    }
}

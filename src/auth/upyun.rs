//! Upyun callbacks: body digest plus header signature.
//!
//! The body MD5 must match `Content-MD5` before the signature is looked at,
//! because the signature covers the digest header rather than the body.
//! The signature is `UPYUN <access_key>:<base64(HMAC-SHA1(hex(md5(secret)),
//! method&path&date&content_md5))>`.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha1::Sha1;
use tracing::debug;

use super::{CallbackRequest, VerifyError};
use crate::models::policy::Secret;

type HmacSha1 = Hmac<Sha1>;

pub struct UpyunVerifier {
    access_key: Secret,
    secret_key: Secret,
}

impl UpyunVerifier {
    pub fn new(access_key: Secret, secret_key: Secret) -> Self {
        Self {
            access_key,
            secret_key,
        }
    }

    /// The `Authorization` value Upyun would send for `items`.
    pub fn sign(&self, items: &[&str]) -> String {
        let password = hex::encode(Md5::digest(self.secret_key.expose().as_bytes()));
        let mut mac =
            HmacSha1::new_from_slice(password.as_bytes()).expect("HMAC can take key of any size");
        mac.update(items.join("&").as_bytes());
        format!(
            "UPYUN {}:{}",
            self.access_key.expose(),
            STANDARD.encode(mac.finalize().into_bytes())
        )
    }

    pub fn verify(&self, request: &CallbackRequest<'_>) -> Result<(), VerifyError> {
        let content_md5 = request.header("content-md5").unwrap_or_default();
        let actual_md5 = hex::encode(Md5::digest(request.body.as_bytes()));
        if actual_md5 != content_md5 {
            debug!(expected = content_md5, actual = %actual_md5, "Upyun callback body digest mismatch");
            return Err(VerifyError::ContentIntegrityMismatch);
        }

        let date = request.header("date").unwrap_or_default();
        let expected = self.sign(&[
            request.method.as_str(),
            request.uri.path(),
            date,
            content_md5,
        ]);
        if request.header("authorization") != Some(expected.as_str()) {
            return Err(VerifyError::SignatureMismatch);
        }
        Ok(())
    }
}

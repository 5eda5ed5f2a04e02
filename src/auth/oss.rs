//! Aliyun OSS callback signatures.
//!
//! OSS signs `urldecode(path)[?query] + "\n" + body` with RSA PKCS#1 v1.5
//! over MD5. The public key is published by Aliyun; its URL arrives base64
//! encoded in `x-oss-pub-key-url` and must point at `gosspublic.alicdn.com`.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use md5::{Digest, Md5};
use moka::future::Cache;
use rsa::{Pkcs1v15Sign, RsaPublicKey, pkcs8::DecodePublicKey};
use std::{sync::Arc, time::Duration};
use tracing::debug;

use super::{
    CallbackRequest,
    vendor::{CallbackMac, MacError},
};

const PUB_KEY_URL_HEADER: &str = "x-oss-pub-key-url";
const TRUSTED_KEY_PREFIXES: [&str; 2] = [
    "http://gosspublic.alicdn.com/",
    "https://gosspublic.alicdn.com/",
];

/// Where OSS public keys come from.
#[async_trait]
pub trait PublicKeySource: Send + Sync {
    /// PEM encoded public key published at `url`.
    async fn fetch(&self, url: &str) -> Result<String, MacError>;
}

/// Fetches public keys over HTTP and keeps them for a while.
pub struct HttpPublicKeySource {
    client: reqwest::Client,
    cache: Cache<String, String>,
}

impl HttpPublicKeySource {
    pub fn new(ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache: Cache::builder().max_capacity(16).time_to_live(ttl).build(),
        }
    }
}

#[async_trait]
impl PublicKeySource for HttpPublicKeySource {
    async fn fetch(&self, url: &str) -> Result<String, MacError> {
        if let Some(pem) = self.cache.get(url).await {
            return Ok(pem);
        }

        debug!(url, "Fetching OSS callback public key");
        let pem = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|err| MacError::KeyFetch(err.to_string()))?
            .text()
            .await
            .map_err(|err| MacError::KeyFetch(err.to_string()))?;

        self.cache.insert(url.to_string(), pem.clone()).await;
        Ok(pem)
    }
}

pub struct OssCallbackMac {
    keys: Arc<dyn PublicKeySource>,
}

impl OssCallbackMac {
    pub fn new(keys: Arc<dyn PublicKeySource>) -> Self {
        Self { keys }
    }
}

fn public_key_url(request: &CallbackRequest<'_>) -> Result<String, MacError> {
    let encoded = request
        .header(PUB_KEY_URL_HEADER)
        .ok_or(MacError::MissingHeader(PUB_KEY_URL_HEADER))?;
    let url = STANDARD
        .decode(encoded)
        .ok()
        .and_then(|raw| String::from_utf8(raw).ok())
        .ok_or_else(|| MacError::MalformedHeader {
            header: PUB_KEY_URL_HEADER,
            reason: "not base64 encoded UTF-8".into(),
        })?;

    if !TRUSTED_KEY_PREFIXES.iter().any(|p| url.starts_with(p)) {
        return Err(MacError::UntrustedKeyUrl(url));
    }
    Ok(url)
}

/// MD5 of the content OSS signs.
pub fn signed_digest(request: &CallbackRequest<'_>) -> Vec<u8> {
    let path = urlencoding::decode(request.uri.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| request.uri.path().to_string());

    let mut hasher = Md5::new();
    hasher.update(path.as_bytes());
    if let Some(query) = request.uri.query().filter(|q| !q.is_empty()) {
        hasher.update(b"?");
        hasher.update(query.as_bytes());
    }
    hasher.update(b"\n");
    hasher.update(request.body.as_bytes());
    hasher.finalize().to_vec()
}

#[async_trait]
impl CallbackMac for OssCallbackMac {
    async fn verify_callback(&self, request: &CallbackRequest<'_>) -> Result<bool, MacError> {
        let url = public_key_url(request)?;

        let authorization = request
            .header("authorization")
            .filter(|a| !a.is_empty())
            .ok_or(MacError::MissingHeader("authorization"))?;
        let signature = STANDARD
            .decode(authorization)
            .map_err(|err| MacError::MalformedHeader {
                header: "authorization",
                reason: err.to_string(),
            })?;

        let pem = self.keys.fetch(&url).await?;
        let key = RsaPublicKey::from_public_key_pem(pem.trim())
            .map_err(|err| MacError::InvalidPublicKey(err.to_string()))?;

        let digest = signed_digest(request);
        Ok(key
            .verify(Pkcs1v15Sign::new::<Md5>(), &digest, &signature)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::ReplayableBody;
    use axum::http::{Request, request::Parts};
    use rsa::{
        RsaPrivateKey,
        pkcs8::{EncodePublicKey, LineEnding},
    };

    const KEY_URL: &str = "https://gosspublic.alicdn.com/callback_pub_key_v1.pem";

    struct StaticKey(String);

    #[async_trait]
    impl PublicKeySource for StaticKey {
        async fn fetch(&self, _url: &str) -> Result<String, MacError> {
            Ok(self.0.clone())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl PublicKeySource for Unreachable {
        async fn fetch(&self, _url: &str) -> Result<String, MacError> {
            Err(MacError::KeyFetch("connection refused".into()))
        }
    }

    fn parts(key_url: &str, authorization: &str) -> Parts {
        Request::builder()
            .method("POST")
            .uri("/api/v3/callback/oss/some%20key?from=oss")
            .header(PUB_KEY_URL_HEADER, STANDARD.encode(key_url))
            .header("authorization", authorization)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn keypair() -> (RsaPrivateKey, String) {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let pem = RsaPublicKey::from(&private)
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        (private, pem)
    }

    fn sign(private: &RsaPrivateKey, body: &ReplayableBody) -> String {
        let unsigned = parts(KEY_URL, "x");
        let digest = signed_digest(&CallbackRequest::new(&unsigned, body));
        STANDARD.encode(private.sign(Pkcs1v15Sign::new::<Md5>(), &digest).unwrap())
    }

    #[tokio::test]
    async fn genuine_callback_verifies_and_tampering_does_not() {
        let (private, pem) = keypair();
        let mac = OssCallbackMac::new(Arc::new(StaticKey(pem)));
        let body = ReplayableBody::from_bytes(&b"filename=a.txt&size=3"[..]);
        let signature = sign(&private, &body);

        let parts = parts(KEY_URL, &signature);
        assert!(mac
            .verify_callback(&CallbackRequest::new(&parts, &body))
            .await
            .unwrap());

        let tampered = ReplayableBody::from_bytes(&b"filename=a.txt&size=4"[..]);
        assert!(!mac
            .verify_callback(&CallbackRequest::new(&parts, &tampered))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn untrusted_key_url_is_refused_before_fetching() {
        let mac = OssCallbackMac::new(Arc::new(Unreachable));
        let parts = parts("https://evil.example.com/key.pem", "c2ln");
        let body = ReplayableBody::default();
        let err = mac
            .verify_callback(&CallbackRequest::new(&parts, &body))
            .await
            .unwrap_err();
        assert!(matches!(err, MacError::UntrustedKeyUrl(_)));
    }

    #[tokio::test]
    async fn key_fetch_failure_is_an_error() {
        let mac = OssCallbackMac::new(Arc::new(Unreachable));
        let parts = parts(KEY_URL, "c2ln");
        let body = ReplayableBody::default();
        let err = mac
            .verify_callback(&CallbackRequest::new(&parts, &body))
            .await
            .unwrap_err();
        assert!(matches!(err, MacError::KeyFetch(_)));
    }

    #[tokio::test]
    async fn garbage_public_key_is_an_error() {
        let mac = OssCallbackMac::new(Arc::new(StaticKey("not a key".into())));
        let parts = parts(KEY_URL, "c2ln");
        let body = ReplayableBody::default();
        let err = mac
            .verify_callback(&CallbackRequest::new(&parts, &body))
            .await
            .unwrap_err();
        assert!(matches!(err, MacError::InvalidPublicKey(_)));
    }
}

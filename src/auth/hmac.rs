//! Shared-secret HMAC request signing.
//!
//! A signature is `base64url(HMAC-SHA256(secret, content + ":" + expires))`
//! followed by `":" + expires`, where `expires` is a unix timestamp and `0`
//! means the signature never expires.
//!
//! State-changing requests (`PUT`, `POST`) sign a canonical JSON document of
//! method, path, `X-` headers and body, carried as `Authorization: Bearer`.
//! Everything else signs only the URI path and carries the signature in the
//! `sign` query parameter.

use axum::http::{HeaderMap, Method, Uri};
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use super::{CallbackRequest, VerifyError};

type HmacSha256 = Hmac<Sha256>;

const SIGN_QUERY_PARAM: &str = "sign";
/// Set by clients to the original file name, which may be rewritten by proxies.
const UNSIGNED_HEADER: &str = "x-filename";

/// HMAC-SHA256 signer keyed by a shared secret.
#[derive(Clone)]
pub struct HmacAuth {
    secret_key: Vec<u8>,
}

impl HmacAuth {
    pub fn new(secret_key: impl AsRef<[u8]>) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
        }
    }

    /// Sign `content` with an absolute `expires` timestamp.
    pub fn sign(&self, content: &str, expires: i64) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(format!("{content}:{expires}").as_bytes());
        format!("{}:{}", URL_SAFE.encode(mac.finalize().into_bytes()), expires)
    }

    pub fn check(&self, content: &str, sign: &str) -> Result<(), VerifyError> {
        self.check_at(content, sign, Utc::now().timestamp())
    }

    /// Check `sign` against `content` as of the unix time `now`.
    pub fn check_at(&self, content: &str, sign: &str, now: i64) -> Result<(), VerifyError> {
        let expires = match sign.rsplit_once(':') {
            Some((_, expires)) if !expires.is_empty() => expires,
            _ => return Err(VerifyError::MalformedSignature("expiry missing".into())),
        };
        let expires: i64 = expires
            .parse()
            .map_err(|_| VerifyError::MalformedSignature(format!("invalid expiry `{expires}`")))?;

        if expires != 0 && expires < now {
            return Err(VerifyError::SignatureExpired);
        }
        if self.sign(content, expires) != sign {
            return Err(VerifyError::SignatureMismatch);
        }
        Ok(())
    }

    /// Sign a state-changing request, returning the `Authorization` value.
    ///
    /// `ttl_secs` of zero produces a signature that never expires.
    pub fn sign_request(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        body: &[u8],
        ttl_secs: i64,
    ) -> String {
        let content = request_sign_content(method, path, headers, body);
        format!("Bearer {}", self.sign(&content, absolute_expiry(ttl_secs)))
    }

    /// Append a `sign` query parameter covering the path of `uri`.
    pub fn sign_uri(&self, uri: &Uri, ttl_secs: i64) -> String {
        let sign = self.sign(uri.path(), absolute_expiry(ttl_secs));
        let mut query: Vec<(String, String)> = query_pairs(uri)
            .into_iter()
            .filter(|(k, _)| k != SIGN_QUERY_PARAM)
            .collect();
        query.push((SIGN_QUERY_PARAM.to_string(), sign));
        let query = query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", uri.path(), query)
    }
}

fn absolute_expiry(ttl_secs: i64) -> i64 {
    if ttl_secs > 0 {
        Utc::now().timestamp() + ttl_secs
    } else {
        0
    }
}

fn is_state_changing(method: &Method) -> bool {
    method == Method::PUT || method == Method::POST
}

/// Check a request signed by [`HmacAuth::sign_request`] or
/// [`HmacAuth::sign_uri`], depending on its method.
pub fn check_request(auth: &HmacAuth, request: &CallbackRequest<'_>) -> Result<(), VerifyError> {
    if is_state_changing(request.method) {
        let sign = request
            .header("authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(VerifyError::SignatureMismatch)?;
        let content = request_sign_content(
            request.method,
            request.uri.path(),
            request.headers,
            request.body.as_bytes(),
        );
        auth.check(&content, sign)
    } else {
        check_uri(auth, request.uri)
    }
}

/// Check the `sign` query parameter against the path of `uri`.
pub fn check_uri(auth: &HmacAuth, uri: &Uri) -> Result<(), VerifyError> {
    let sign = query_pairs(uri)
        .into_iter()
        .find_map(|(k, v)| (k == SIGN_QUERY_PARAM).then_some(v))
        .unwrap_or_default();
    auth.check(uri.path(), &sign)
}

#[derive(Serialize)]
struct RequestSignContent<'a> {
    #[serde(rename = "Method")]
    method: &'a str,
    #[serde(rename = "Path")]
    path: &'a str,
    #[serde(rename = "Header")]
    header: String,
    #[serde(rename = "Body")]
    body: String,
}

/// Canonical content signed for a state-changing request.
pub fn request_sign_content(method: &Method, path: &str, headers: &HeaderMap, body: &[u8]) -> String {
    let mut signed_headers: Vec<String> = headers
        .keys()
        .filter(|name| name.as_str().starts_with("x-") && name.as_str() != UNSIGNED_HEADER)
        .filter_map(|name| {
            let value = headers.get(name)?.to_str().ok()?;
            Some(format!("{}={}", name.as_str(), value))
        })
        .collect();
    signed_headers.sort();

    let content = RequestSignContent {
        method: method.as_str(),
        path,
        header: signed_headers.join("&"),
        body: String::from_utf8_lossy(body).into_owned(),
    };
    // Serializing a struct of strings cannot fail.
    serde_json::to_string(&content).unwrap_or_default()
}

fn query_pairs(uri: &Uri) -> Vec<(String, String)> {
    uri.query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |s: &str| {
                urlencoding::decode(&s.replace('+', " "))
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            };
            (decode(k), decode(v))
        })
        .collect()
}

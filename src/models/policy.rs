//! Storage policies and the provider kinds they select.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Storage provider a policy uploads to.
///
/// The set is closed: each provider has exactly one callback verification
/// scheme, chosen when a verifier is built from the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Local disk on this node. Never receives callbacks.
    Local,
    /// A slave node running this service, signs with the shared HMAC scheme.
    Remote,
    Qiniu,
    /// Aliyun OSS.
    Oss,
    Upyun,
    OneDrive,
    /// Tencent COS.
    Cos,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Remote => "remote",
            Provider::Qiniu => "qiniu",
            Provider::Oss => "oss",
            Provider::Upyun => "upyun",
            Provider::OneDrive => "onedrive",
            Provider::Cos => "cos",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown storage provider `{0}`")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Provider::Local),
            "remote" => Ok(Provider::Remote),
            "qiniu" => Ok(Provider::Qiniu),
            "oss" => Ok(Provider::Oss),
            "upyun" => Ok(Provider::Upyun),
            "onedrive" => Ok(Provider::OneDrive),
            "cos" => Ok(Provider::Cos),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// A string that never shows up in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", "*".repeat(self.0.len()))
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&"*".repeat(self.0.len()))
    }
}

/// Per-user upload configuration: which provider, and the credentials used
/// to check that provider's callbacks.
#[derive(Debug, Clone)]
pub struct StoragePolicy {
    pub id: i64,
    pub name: String,
    pub provider: Provider,
    /// Endpoint of the provider or slave node, if any.
    pub server: Option<String>,
    pub access_key: Secret,
    pub secret_key: Secret,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_round_trips_through_its_name() {
        for provider in [
            Provider::Local,
            Provider::Remote,
            Provider::Qiniu,
            Provider::Oss,
            Provider::Upyun,
            Provider::OneDrive,
            Provider::Cos,
        ] {
            assert_eq!(provider.as_str().parse::<Provider>().ok(), Some(provider));
        }
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let err = "s3".parse::<Provider>().unwrap_err();
        assert_eq!(err.to_string(), "unknown storage provider `s3`");
    }

    #[test]
    fn secrets_are_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret}"), "*******");
        assert_eq!(format!("{secret:?}"), "Secret(*******)");
        assert_eq!(secret.expose(), "hunter2");
    }
}

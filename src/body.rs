//! Request bodies that are read once and replayed to later consumers.
//!
//! Signature checks hash the raw body, and the handlers behind them parse it
//! again, so the callback layer buffers it into an owned buffer and hands out
//! fresh `Body` views.

use axum::body::{Body, to_bytes};
use bytes::Bytes;
use tracing::debug;

use crate::auth::VerifyError;

/// A fully buffered request body.
#[derive(Debug, Clone, Default)]
pub struct ReplayableBody {
    bytes: Bytes,
}

impl ReplayableBody {
    /// Read `body` to the end, failing if it exceeds `limit` bytes.
    pub async fn buffer(body: Body, limit: usize) -> Result<Self, VerifyError> {
        let bytes = to_bytes(body, limit)
            .await
            .map_err(|err| VerifyError::BodyReadFailure(err.to_string()))?;
        debug!(size = bytes.len(), "Buffered callback body");
        Ok(Self { bytes })
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// A new body yielding the buffered bytes. Does not copy.
    pub fn replay(&self) -> Body {
        Body::from(self.bytes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_the_same_bytes_more_than_once() {
        let body = ReplayableBody::buffer(Body::from("hello callback"), 1024)
            .await
            .unwrap();
        assert_eq!(body.len(), 14);

        for _ in 0..2 {
            let replayed = to_bytes(body.replay(), 1024).await.unwrap();
            assert_eq!(&replayed[..], b"hello callback");
        }
    }

    #[tokio::test]
    async fn oversized_bodies_fail_to_buffer() {
        let err = ReplayableBody::buffer(Body::from(vec![0u8; 64]), 16)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::BodyReadFailure(_)));
    }
}

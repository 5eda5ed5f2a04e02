//! One-time callback sessions issued when an upload starts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upload fields the provider callback is expected to complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMetadata {
    /// Directory the file lands in, as the user sees it.
    pub virtual_path: String,
    pub name: String,
    pub size: u64,
    /// Object key on the provider side, when it differs from the name.
    #[serde(default)]
    pub save_key: Option<String>,
}

/// A pending upload waiting for its provider callback.
///
/// The key is the only credential a pass-through provider presents, so it
/// is random and consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackSession {
    pub key: String,
    pub user_id: i64,
    pub policy_id: i64,
    pub metadata: UploadMetadata,
}

impl CallbackSession {
    /// Create a session with a fresh random callback key.
    pub fn new(user_id: i64, policy_id: i64, metadata: UploadMetadata) -> Self {
        Self {
            key: Uuid::new_v4().simple().to_string(),
            user_id,
            policy_id,
            metadata,
        }
    }
}

//! Users as seen by the callback layer: identity, status and bound policy.

use super::policy::StoragePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    NotActivated,
    Banned,
    OveruseBanned,
}

impl UserStatus {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(UserStatus::Active),
            1 => Some(UserStatus::NotActivated),
            2 => Some(UserStatus::Banned),
            3 => Some(UserStatus::OveruseBanned),
            _ => None,
        }
    }
}

/// The uploading user a callback is bound to.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub nickname: String,
    pub status: UserStatus,
    pub policy: StoragePolicy,
}

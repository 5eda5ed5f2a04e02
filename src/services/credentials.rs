//! Resolves the user a callback session belongs to, with its policy.

use std::sync::Arc;
use tracing::{debug, warn};

use super::user_store::UserStore;
use crate::{
    errors::CallbackError,
    models::{policy::StoragePolicy, user::User},
};

#[derive(Clone)]
pub struct CredentialResolver {
    users: Arc<dyn UserStore>,
}

impl CredentialResolver {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// The active user `user_id` and the policy supplying its credentials.
    ///
    /// Store failures are logged and reported as a missing user.
    pub async fn resolve(&self, user_id: i64) -> Result<(User, StoragePolicy), CallbackError> {
        match self.users.get_active_user_by_id(user_id).await {
            Ok(Some(user)) => {
                let policy = user.policy.clone();
                Ok((user, policy))
            }
            Ok(None) => {
                debug!(user_id, "Callback user missing or inactive");
                Err(CallbackError::UserNotFound)
            }
            Err(err) => {
                warn!(user_id, error = %err, "User lookup failed");
                Err(CallbackError::UserNotFound)
            }
        }
    }
}

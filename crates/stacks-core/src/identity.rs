//! Stable per-installation user identifier

use crate::storage::{KeyValueStore, USER_ID_KEY};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

/// Value handed out when storage can't be reached
pub const NO_IDENTITY: &str = "null";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn unavailable() -> Self {
        Self(NO_IDENTITY.to_string())
    }

    /// False for the sentinel; such an id must never key persisted data.
    pub fn is_available(&self) -> bool {
        self.0 != NO_IDENTITY && !self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Return the persisted user id, generating and saving one on first use.
pub fn get_or_create_user_id(store: &dyn KeyValueStore) -> UserId {
    match store.get(USER_ID_KEY) {
        Ok(Some(id)) if !id.is_empty() => return UserId(id),
        Ok(_) => {}
        Err(e) => {
            warn!(error = %e, "storage unavailable, running without an identity");
            return UserId::unavailable();
        }
    }

    let id = Uuid::new_v4().to_string();
    if let Err(e) = store.set(USER_ID_KEY, &id) {
        warn!(error = %e, "could not persist new user id");
        return UserId::unavailable();
    }

    info!(user_id = %id, "created user id");
    UserId(id)
}

/// Drop the persisted id so the next lookup generates a fresh one.
pub fn forget_user_id(store: &dyn KeyValueStore) -> anyhow::Result<()> {
    store.remove(USER_ID_KEY)
}

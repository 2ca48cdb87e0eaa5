//! Local, password-less login
//!
//! A "login" only records a display name next to the installation's user id.

use crate::identity::{forget_user_id, get_or_create_user_id, UserId};
use crate::storage::{SharedStore, CURRENT_USER_KEY};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Username cannot be empty")]
    EmptyName,
    #[error("No user id available; local storage is not accessible")]
    NoIdentity,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct ProfileStore {
    store: SharedStore,
}

impl ProfileStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// The saved profile, if any. Unreadable profile data is discarded.
    pub fn current(&self) -> Option<UserProfile> {
        let raw = match self.store.get(CURRENT_USER_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "could not read saved profile");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(error = %e, "discarding malformed saved profile");
                if let Err(e) = self.store.remove(CURRENT_USER_KEY) {
                    warn!(error = %e, "could not remove malformed profile");
                }
                None
            }
        }
    }

    pub fn login(&self, name: &str) -> Result<UserProfile, ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::EmptyName);
        }

        let id = get_or_create_user_id(self.store.as_ref());
        if !id.is_available() {
            return Err(ProfileError::NoIdentity);
        }

        let profile = UserProfile {
            id,
            name: name.to_string(),
        };
        let serialized = serde_json::to_string(&profile).map_err(anyhow::Error::from)?;
        self.store.set(CURRENT_USER_KEY, &serialized)?;

        info!(user = %profile.name, "logged in");
        Ok(profile)
    }

    /// Forget both the profile and the user id.
    pub fn logout(&self) -> anyhow::Result<()> {
        self.store.remove(CURRENT_USER_KEY)?;
        forget_user_id(self.store.as_ref())?;
        info!("logged out");
        Ok(())
    }
}

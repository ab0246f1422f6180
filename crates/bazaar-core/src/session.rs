// SPDX-License-Identifier: AGPL-3.0
// Bazaar Core - Session store
//
// Holds at most one signed-in user. A write is visible to the next read,
// so a missing record is taken at face value.

use crate::identity::{ExternalProfile, IdentityApi};
use crate::store::{keys, load_json, save_json, KeyValueStore};
use crate::types::{AppError, User};
use std::sync::Arc;

/// Shown when the provider has no usable email for the account
pub const MISSING_EMAIL: &str = "No email provided";

/// Map a provider profile to the app's user record
pub fn convert_external_profile(profile: ExternalProfile) -> User {
    let name = profile
        .name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| profile.login.clone());
    let email = profile
        .email
        .filter(|email| !email.is_empty())
        .unwrap_or_else(|| MISSING_EMAIL.to_string());

    User {
        username: profile.login,
        name,
        email,
        avatar: profile.avatar_url,
        is_authenticated: true,
    }
}

/// Persisted singleton user plus the identity provider used to sign in
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    identity: Arc<dyn IdentityApi>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>, identity: Arc<dyn IdentityApi>) -> Self {
        Self { store, identity }
    }

    /// Replace the stored user
    pub async fn save_user(&self, user: &User) -> Result<(), AppError> {
        save_json(self.store.as_ref(), keys::USER, user)
            .await
            .inspect_err(|e| tracing::error!("Error saving user: {}", e))?;
        tracing::info!("Saved session for {}", user.username);
        Ok(())
    }

    /// The stored user, `None` if there is none or it cannot be read
    pub async fn get_user(&self) -> Option<User> {
        match load_json(self.store.as_ref(), keys::USER).await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!("Error getting user: {}", e);
                None
            }
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.get_user()
            .await
            .is_some_and(|user| user.is_authenticated)
    }

    /// Forget the stored user
    pub async fn logout(&self) -> Result<(), AppError> {
        self.store
            .remove(keys::USER)
            .await
            .inspect_err(|e| tracing::error!("Error logging out: {}", e))?;
        tracing::info!("Logged out");
        Ok(())
    }

    /// Fetch the provider profile. If it carries no email, one extra call
    /// lists the account's emails and the primary verified one is used.
    pub async fn fetch_remote_profile(
        &self,
        access_token: &str,
    ) -> Result<ExternalProfile, AppError> {
        let mut profile = self
            .identity
            .fetch_profile(access_token)
            .await
            .inspect_err(|e| tracing::error!("Error fetching profile: {}", e))?;

        if profile.email.as_deref().map_or(true, str::is_empty) {
            match self.identity.fetch_emails(access_token).await {
                Ok(emails) => {
                    profile.email = emails
                        .into_iter()
                        .find(|e| e.primary && e.verified)
                        .map(|e| e.email);
                }
                Err(e) => tracing::warn!("Could not list account emails: {}", e),
            }
        }

        Ok(profile)
    }

    /// Fetch, convert and persist the profile for `access_token`
    pub async fn sign_in(&self, access_token: &str) -> Result<User, AppError> {
        let profile = self.fetch_remote_profile(access_token).await?;
        let user = convert_external_profile(profile);
        self.save_user(&user).await?;
        Ok(user)
    }
}

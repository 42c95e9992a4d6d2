//! Account reconciliation: maps an external identity onto a local user.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::StoreError;
use super::store::UserStore;
use crate::models::oauth::ExternalIdentity;
use crate::models::user::{LinkedProvider, User};

/// Finds, creates or refreshes the local account for a provider identity.
///
/// Accounts are keyed by `(provider, provider_subject_id)` only. Two provider
/// accounts sharing an email address stay separate users.
#[derive(Clone)]
pub struct AccountReconciler {
    store: Arc<dyn UserStore>,
}

impl AccountReconciler {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Resolve the local user for `identity`, creating it on first sight.
    ///
    /// Existing users only get avatar, verification flag and linked subject id
    /// refreshed; the first-seen email is kept.
    pub async fn find_or_create(&self, identity: &ExternalIdentity) -> Result<User, StoreError> {
        let existing = self
            .store
            .find_by_provider_identity(identity.provider(), identity.provider_subject_id())
            .await?;

        if let Some(user) = existing {
            return self.sync(user, identity).await;
        }

        match self.store.create(new_user(identity)).await {
            Ok(user) => {
                info!(
                    user_id = ?user.id,
                    provider = %identity.provider(),
                    "created user from provider identity"
                );
                Ok(user)
            }
            Err(StoreError::Conflict(reason)) => {
                // Lost a race with a concurrent first login for the same subject.
                warn!(provider = %identity.provider(), %reason, "user created concurrently, re-reading");
                let user = self
                    .store
                    .find_by_provider_identity(identity.provider(), identity.provider_subject_id())
                    .await?
                    .ok_or(StoreError::Conflict(reason))?;
                self.sync(user, identity).await
            }
            Err(e) => Err(e),
        }
    }

    async fn sync(&self, mut user: User, identity: &ExternalIdentity) -> Result<User, StoreError> {
        user.avatar_url = identity.avatar_url().map(str::to_string);
        user.verified = identity.email_verified();
        user.linked_provider = Some(LinkedProvider {
            provider: identity.provider(),
            subject_id: identity.provider_subject_id().to_string(),
        });
        user.updated_at = Some(Utc::now());
        self.store.update(user).await
    }
}

fn new_user(identity: &ExternalIdentity) -> User {
    let mut user = User::new(identity.email());
    user.avatar_url = identity.avatar_url().map(str::to_string);
    user.verified = identity.email_verified();
    user.linked_provider = Some(LinkedProvider {
        provider: identity.provider(),
        subject_id: identity.provider_subject_id().to_string(),
    });
    user
}

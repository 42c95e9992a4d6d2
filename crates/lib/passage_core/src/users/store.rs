//! User store abstraction and an in-memory implementation.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::StoreError;
use crate::models::oauth::OAuthProvider;
use crate::models::user::User;

/// Persistence boundary for user accounts.
///
/// The core only ever calls these four operations.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up the user linked to a provider account.
    async fn find_by_provider_identity(
        &self,
        provider: OAuthProvider,
        subject_id: &str,
    ) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// Persist a new user and return it with its assigned id.
    ///
    /// Fails with [`StoreError::Conflict`] if the linked provider account is
    /// already attached to another user.
    async fn create(&self, user: User) -> Result<User, StoreError>;

    /// Persist changes to an existing user. The stored email is never changed.
    async fn update(&self, user: User) -> Result<User, StoreError>;
}

/// Process-local user store, for tests and single-node development.
#[derive(Debug)]
pub struct InMemoryUserStore {
    users: DashMap<i64, User>,
    /// `(provider, subject_id)` → user id.
    identities: DashMap<(OAuthProvider, String), i64>,
    next_id: AtomicI64,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            identities: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_provider_identity(
        &self,
        provider: OAuthProvider,
        subject_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let id = self
            .identities
            .get(&(provider, subject_id.to_string()))
            .map(|e| *e.value());
        Ok(id.and_then(|id| self.users.get(&id).map(|u| u.value().clone())))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn create(&self, mut user: User) -> Result<User, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        user.id = Some(id);

        let Some(link) = user.linked_provider.clone() else {
            self.users.insert(id, user.clone());
            return Ok(user);
        };

        // The user row must exist before the identity becomes visible.
        match self.identities.entry((link.provider, link.subject_id.clone())) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "{} account {} is already linked",
                link.provider, link.subject_id
            ))),
            Entry::Vacant(slot) => {
                self.users.insert(id, user.clone());
                slot.insert(id);
                Ok(user)
            }
        }
    }

    async fn update(&self, mut user: User) -> Result<User, StoreError> {
        let id = user
            .id
            .ok_or_else(|| StoreError::NotFound("user has no id".into()))?;
        let previous_link = {
            let existing = self
                .users
                .get(&id)
                .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
            user.email = existing.email.clone();
            existing.linked_provider.clone()
        };

        if previous_link != user.linked_provider {
            if let Some(link) = &user.linked_provider {
                let key = (link.provider, link.subject_id.clone());
                match self.identities.entry(key) {
                    Entry::Occupied(e) if *e.get() != id => {
                        return Err(StoreError::Conflict(format!(
                            "{} account {} is already linked",
                            link.provider, link.subject_id
                        )));
                    }
                    Entry::Occupied(_) => {}
                    Entry::Vacant(slot) => {
                        slot.insert(id);
                    }
                }
            }
            if let Some(old) = previous_link {
                self.identities
                    .remove_if(&(old.provider, old.subject_id), |_, owner| *owner == id);
            }
        }

        self.users.insert(id, user.clone());
        Ok(user)
    }
}

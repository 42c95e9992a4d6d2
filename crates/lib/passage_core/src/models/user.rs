//! Local user account models.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::oauth::OAuthProvider;

/// Role granted to every newly created account.
pub const DEFAULT_ROLE: &str = "USER";

/// Provider account linked to a local user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedProvider {
    pub provider: OAuthProvider,
    pub subject_id: String,
}

/// Domain user.
///
/// `id` is `None` until the user store has persisted the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Option<i64>,
    pub email: String,
    pub roles: BTreeSet<String>,
    pub avatar_url: Option<String>,
    pub verified: bool,
    pub linked_provider: Option<LinkedProvider>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// A not-yet-persisted user with the default role set.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: None,
            email: email.into(),
            roles: default_roles(),
            avatar_url: None,
            verified: false,
            linked_provider: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Roles in stable order, as embedded in token claims.
    pub fn role_list(&self) -> Vec<String> {
        self.roles.iter().cloned().collect()
    }
}

/// The `{"USER"}` role set.
pub fn default_roles() -> BTreeSet<String> {
    BTreeSet::from([DEFAULT_ROLE.to_string()])
}

/// Linked provider as exposed to API consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedProviderView {
    pub name: OAuthProvider,
    pub provider_id: String,
}

/// Read-only projection of a [`User`] returned across the API boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Option<i64>,
    pub email: String,
    pub roles: Vec<String>,
    pub avatar: Option<String>,
    pub is_verified: bool,
    pub oauth_provider: Option<LinkedProviderView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            roles: user.role_list(),
            avatar: user.avatar_url.clone(),
            is_verified: user.verified,
            oauth_provider: user.linked_provider.as_ref().map(|p| LinkedProviderView {
                name: p.provider,
                provider_id: p.subject_id.clone(),
            }),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// [`UserView`] without roles, for profiles looked up by someone other than
/// their owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUserView {
    pub id: Option<i64>,
    pub email: String,
    pub avatar: Option<String>,
    pub is_verified: bool,
    pub oauth_provider: Option<LinkedProviderView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<UserView> for PublicUserView {
    fn from(view: UserView) -> Self {
        Self {
            id: view.id,
            email: view.email,
            avatar: view.avatar,
            is_verified: view.is_verified,
            oauth_provider: view.oauth_provider,
            created_at: view.created_at,
            updated_at: view.updated_at,
        }
    }
}

/// Partial profile update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub avatar: Option<String>,
    pub roles: Option<BTreeSet<String>>,
}

//! External identity provider models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported third-party identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Facebook,
}

impl OAuthProvider {
    /// Stable lowercase identifier used in storage and URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Facebook => "facebook",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OAuthProvider::Google => f.write_str("Google"),
            OAuthProvider::Facebook => f.write_str("Facebook"),
        }
    }
}

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown OAuth provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for OAuthProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(OAuthProvider::Google),
            "facebook" => Ok(OAuthProvider::Facebook),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

/// Canonical, provider-agnostic view of a user's external account.
///
/// Only built by the claims mapper, which guarantees a non-empty email and
/// subject id. `(provider, provider_subject_id)` is the natural key used to
/// locate the local user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    provider: OAuthProvider,
    provider_subject_id: String,
    email: String,
    avatar_url: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    email_verified: bool,
}

impl ExternalIdentity {
    pub(crate) fn new(
        provider: OAuthProvider,
        provider_subject_id: String,
        email: String,
        avatar_url: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
        email_verified: bool,
    ) -> Self {
        Self {
            provider,
            provider_subject_id,
            email,
            avatar_url,
            first_name,
            last_name,
            email_verified,
        }
    }

    pub fn provider(&self) -> OAuthProvider {
        self.provider
    }

    pub fn provider_subject_id(&self) -> &str {
        &self.provider_subject_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    pub fn first_name(&self) -> Option<&str> {
        self.first_name.as_deref()
    }

    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    pub fn email_verified(&self) -> bool {
        self.email_verified
    }
}

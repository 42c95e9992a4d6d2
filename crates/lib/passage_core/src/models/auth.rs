//! Session credential models.

use serde::{Deserialize, Serialize};

use super::user::UserView;

/// Value of `token_type` on every issued pair.
pub const TOKEN_TYPE_BEARER: &str = "bearer";

/// Discriminates access tokens from refresh tokens (`type` claim).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims carried by both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer.
    pub iss: String,
    /// Audience.
    pub aud: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Not before (unix timestamp).
    pub nbf: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Unique token id, the revocation key.
    pub jti: String,
    /// Subject: local user id in decimal.
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// On refresh tokens only: `jti` of the access token issued alongside.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_jti: Option<String>,
}

impl TokenClaims {
    /// Subject parsed as a user id.
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Access/refresh pair handed to the client. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub token_type: String,
}

/// Result of a successful provider login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    pub user: UserView,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

//! Session credentials and the login flow.
//!
//! - [`tokens`] mints, validates, refreshes and revokes signed JWTs.
//! - [`revocation`] is the TTL-backed denylist the token engine consults.
//! - [`service`] composes provider client, claims mapper, reconciler and
//!   token engine into the end-to-end login flow.

pub mod revocation;
pub mod service;
pub mod tokens;

use thiserror::Error;

use crate::oauth::{ClaimsError, ProviderError};
use crate::users::StoreError;

/// Token lifecycle errors.
///
/// Each verification failure is a distinct variant so callers can tell an
/// expired session (refresh silently) from a revoked or forged one (log in again).
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Token is not valid yet")]
    NotYetValid,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token has been revoked")]
    Revoked,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Cannot refresh token: {0}")]
    RefreshFailed(Box<TokenError>),

    #[error("Cannot revoke token: {0}")]
    RevokeFailed(Box<TokenError>),

    #[error("Token encoding failed: {0}")]
    Encode(String),

    #[error("Revocation store error: {0}")]
    Store(#[from] StoreError),
}

impl TokenError {
    /// The underlying reason, looking through `RefreshFailed`/`RevokeFailed`.
    pub fn cause(&self) -> &TokenError {
        match self {
            TokenError::RefreshFailed(inner) | TokenError::RevokeFailed(inner) => inner.cause(),
            other => other,
        }
    }
}

/// Broad error category, for mapping onto boundary responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed claims or request input. Never retried.
    Input,
    /// The identity provider call failed.
    Upstream,
    /// Token expired, not yet valid, forged, revoked or of the wrong type.
    Token,
    /// The referenced user does not exist.
    NotFound,
    /// The user or revocation store failed.
    Storage,
}

/// Authentication orchestrator errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Claims(#[from] ClaimsError),

    #[error(transparent)]
    Upstream(#[from] ProviderError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Invalid profile update: {0}")]
    InvalidProfile(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl AuthError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AuthError::Claims(_) | AuthError::InvalidProfile(_) => ErrorCategory::Input,
            AuthError::Upstream(_) => ErrorCategory::Upstream,
            AuthError::Token(e) => match e.cause() {
                TokenError::Store(_) => ErrorCategory::Storage,
                _ => ErrorCategory::Token,
            },
            AuthError::UserNotFound(_) => ErrorCategory::NotFound,
            AuthError::Storage(_) => ErrorCategory::Storage,
        }
    }
}

//! Identity provider integration.
//!
//! [`provider::ProviderClient`] fetches raw claims for a provider access token;
//! [`claims`] normalizes them into an [`ExternalIdentity`](crate::models::oauth::ExternalIdentity).

pub mod claims;
pub mod provider;

use thiserror::Error;

use crate::models::oauth::OAuthProvider;

/// Raw claims could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimsError {
    #[error("missing required claim \"{field}\" from {provider}")]
    MissingClaim {
        provider: OAuthProvider,
        field: &'static str,
    },

    #[error("invalid claim \"{field}\" from {provider}")]
    InvalidClaim {
        provider: OAuthProvider,
        field: &'static str,
    },
}

/// The identity provider could not be reached or rejected the token.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} rejected the token with HTTP {status}")]
    Status { provider: OAuthProvider, status: u16 },

    #[error("Provider request failed: {0}")]
    Transport(String),

    #[error("Provider response could not be decoded: {0}")]
    Decode(String),
}

//! Provider claims → [`ExternalIdentity`] normalization.
//!
//! Pure transformation: no network or storage access.

use serde_json::{Map, Value};

use super::ClaimsError;
use crate::models::oauth::{ExternalIdentity, OAuthProvider};

/// Normalize raw claims for `provider`.
pub fn map_claims(provider: OAuthProvider, raw: &Value) -> Result<ExternalIdentity, ClaimsError> {
    match provider {
        OAuthProvider::Google => map_google_claims(raw),
        OAuthProvider::Facebook => map_facebook_claims(raw),
    }
}

/// Map a Google userinfo payload.
///
/// `email_verified` counts only when it is the JSON boolean `true`.
pub fn map_google_claims(raw: &Value) -> Result<ExternalIdentity, ClaimsError> {
    let provider = OAuthProvider::Google;
    let claims = as_object(provider, raw)?;

    let email = required_email(provider, claims)?;
    let subject = required_subject(provider, claims, "sub")?;

    Ok(ExternalIdentity::new(
        provider,
        subject,
        email,
        optional_string(claims, "picture"),
        optional_string(claims, "given_name"),
        optional_string(claims, "family_name"),
        claims.get("email_verified") == Some(&Value::Bool(true)),
    ))
}

/// Map a Facebook Graph `/me` payload.
///
/// Facebook does not report email verification; these accounts are always
/// treated as verified.
pub fn map_facebook_claims(raw: &Value) -> Result<ExternalIdentity, ClaimsError> {
    let provider = OAuthProvider::Facebook;
    let claims = as_object(provider, raw)?;

    let email = required_email(provider, claims)?;
    let subject = required_subject(provider, claims, "id")?;

    let avatar = raw
        .pointer("/picture/data/url")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(ExternalIdentity::new(
        provider,
        subject,
        email,
        avatar,
        optional_string(claims, "first_name"),
        optional_string(claims, "last_name"),
        true,
    ))
}

fn as_object(provider: OAuthProvider, raw: &Value) -> Result<&Map<String, Value>, ClaimsError> {
    raw.as_object().ok_or(ClaimsError::InvalidClaim {
        provider,
        field: "claims",
    })
}

fn required_email(
    provider: OAuthProvider,
    claims: &Map<String, Value>,
) -> Result<String, ClaimsError> {
    let field = "email";
    match claims.get(field) {
        None | Some(Value::Null) => Err(ClaimsError::MissingClaim { provider, field }),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(ClaimsError::MissingClaim { provider, field })
        }
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ClaimsError::InvalidClaim { provider, field }),
    }
}

/// Subject ids are opaque strings, but some providers emit them as numbers.
fn required_subject(
    provider: OAuthProvider,
    claims: &Map<String, Value>,
    field: &'static str,
) -> Result<String, ClaimsError> {
    match claims.get(field) {
        None | Some(Value::Null) => Err(ClaimsError::MissingClaim { provider, field }),
        Some(Value::String(s)) if s.is_empty() => {
            Err(ClaimsError::MissingClaim { provider, field })
        }
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(ClaimsError::InvalidClaim { provider, field }),
    }
}

fn optional_string(claims: &Map<String, Value>, field: &str) -> Option<String> {
    claims.get(field).and_then(Value::as_str).map(str::to_string)
}

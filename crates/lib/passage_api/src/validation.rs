//! Request validation at the HTTP boundary.

use std::collections::BTreeSet;

use passage_core::models::user::ProfileUpdate;
use url::Url;

use crate::error::AppError;
use crate::models::ProfileUpdateRequest;

/// Roles a profile update may assign.
pub const ALLOWED_ROLES: [&str; 3] = ["USER", "ADMIN", "MODERATOR"];

/// Maximum avatar URL length.
pub const MAX_AVATAR_LEN: usize = 255;

/// Reject blank provider or refresh tokens before they reach the core.
pub fn require_token<'a>(field: &str, token: &'a str) -> Result<&'a str, AppError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be blank")));
    }
    Ok(token)
}

/// Validate a profile update and convert it to the core representation.
pub fn profile_update(req: ProfileUpdateRequest) -> Result<ProfileUpdate, AppError> {
    let avatar = match req.avatar {
        Some(avatar) => {
            if avatar.len() > MAX_AVATAR_LEN {
                return Err(AppError::Validation(format!(
                    "avatar must be at most {MAX_AVATAR_LEN} characters"
                )));
            }
            let url = Url::parse(&avatar)
                .map_err(|_| AppError::Validation("avatar must be a valid URL".into()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(AppError::Validation(
                    "avatar must be an http(s) URL".into(),
                ));
            }
            Some(avatar)
        }
        None => None,
    };

    let roles = match req.roles {
        Some(roles) => {
            if roles.is_empty() {
                return Err(AppError::Validation("roles must not be empty".into()));
            }
            if let Some(bad) = roles.iter().find(|r| !ALLOWED_ROLES.contains(&r.as_str())) {
                return Err(AppError::Validation(format!(
                    "role {bad:?} is not one of {ALLOWED_ROLES:?}"
                )));
            }
            Some(roles.into_iter().collect::<BTreeSet<_>>())
        }
        None => None,
    };

    Ok(ProfileUpdate { avatar, roles })
}

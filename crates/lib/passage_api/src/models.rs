//! Request and response bodies.

use serde::{Deserialize, Serialize};

/// Error body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// `POST /api/auth/{google,facebook}` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderLoginRequest {
    /// Access token issued by the identity provider.
    pub token: String,
}

/// `POST /api/auth/refresh` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(alias = "refresh_token")]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub message: String,
}

/// `PUT /api/users/me` body. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdateRequest {
    pub avatar: Option<String>,
    pub roles: Option<Vec<String>>,
}

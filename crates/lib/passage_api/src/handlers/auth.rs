//! Provider login, token refresh and logout handlers.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use passage_core::models::auth::{AuthResult, TokenPair};
use passage_core::models::oauth::OAuthProvider;
use tracing::debug;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::middleware::auth::bearer_token;
use crate::models::{LogoutResponse, ProviderLoginRequest, RefreshRequest};
use crate::validation::require_token;

/// `POST /api/auth/google`: log in with a Google access token.
pub async fn google_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ProviderLoginRequest>,
) -> AppResult<Json<AuthResult>> {
    provider_login(&state, OAuthProvider::Google, &body).await
}

/// `POST /api/auth/facebook`: log in with a Facebook access token.
pub async fn facebook_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ProviderLoginRequest>,
) -> AppResult<Json<AuthResult>> {
    provider_login(&state, OAuthProvider::Facebook, &body).await
}

async fn provider_login(
    state: &AppState,
    provider: OAuthProvider,
    body: &ProviderLoginRequest,
) -> AppResult<Json<AuthResult>> {
    let token = require_token("token", &body.token)?;
    debug!(%provider, "provider login");
    let result = state.auth.authenticate(provider, token).await?;
    Ok(Json(result))
}

/// `POST /api/auth/refresh`: exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RefreshRequest>,
) -> AppResult<Json<TokenPair>> {
    let token = require_token("refreshToken", &body.refresh_token)?;
    let pair = state.auth.refresh(token).await?;
    Ok(Json(pair))
}

/// `POST /api/auth/logout`: revoke the bearer token (access or refresh).
pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<LogoutResponse>> {
    let token = bearer_token(&headers)?;
    state.auth.revoke(token).await?;
    Ok(Json(LogoutResponse {
        message: "Successfully logged out".into(),
    }))
}

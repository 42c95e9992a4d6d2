//! User profile handlers.

use axum::extract::State;
use axum::{Extension, Json};
use passage_core::models::user::{PublicUserView, UserView};

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::ProfileUpdateRequest;
use crate::validation;

/// `GET /api/users/me`: profile of the authenticated user.
pub async fn get_profile_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<UserView>> {
    let view = state.auth.get_profile(user.user_id()?).await?;
    Ok(Json(view))
}

/// `PUT /api/users/me`: partial update of avatar and/or roles.
pub async fn update_profile_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<ProfileUpdateRequest>,
) -> AppResult<Json<UserView>> {
    let update = validation::profile_update(body)?;
    let view = state.auth.update_profile(user.user_id()?, update).await?;
    Ok(Json(view))
}

/// `GET /api/users/{id}`: public profile of any user, without roles.
pub async fn get_user_handler(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
) -> AppResult<Json<PublicUserView>> {
    let view = state.auth.get_profile(user_id).await?;
    Ok(Json(PublicUserView::from(view)))
}

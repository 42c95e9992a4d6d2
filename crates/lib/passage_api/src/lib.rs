//! # passage_api
//!
//! HTTP API library for Passage.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod validation;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use passage_core::auth::service::AuthService;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{auth, users};

/// Route paths.
pub mod routes {
    pub const POST_AUTH_GOOGLE: &str = "/api/auth/google";
    pub const POST_AUTH_FACEBOOK: &str = "/api/auth/facebook";
    pub const POST_AUTH_REFRESH: &str = "/api/auth/refresh";
    pub const POST_AUTH_LOGOUT: &str = "/api/auth/logout";
    pub const USERS_ME: &str = "/api/users/me";
    pub const USER_BY_ID: &str = "/api/users/{id}";
}

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Login, token and profile operations.
    pub auth: Arc<AuthService>,
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::POST_AUTH_GOOGLE, post(auth::google_handler))
        .route(routes::POST_AUTH_FACEBOOK, post(auth::facebook_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(routes::USER_BY_ID, get(users::get_user_handler));

    // Protected routes (require a valid access token)
    let protected = Router::new()
        .route(
            routes::USERS_ME,
            get(users::get_profile_handler).put(users::update_profile_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}

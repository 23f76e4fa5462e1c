//! HTTP surface of the font identifier: accounts, plans, prediction and
//! saved recordings.

pub mod auth;
pub mod billing;
pub mod error;
pub mod middleware;
pub mod predict;
pub mod recordings;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use auth::AppState;

/// All routes, without transport layers. Protected routes need a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/plans", get(billing::list_plans))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/account", get(auth::account))
        .route("/billing/checkout", post(billing::checkout))
        .route(
            "/predict",
            post(predict::predict).layer(DefaultBodyLimit::max(predict::MAX_IMAGE_SIZE)),
        )
        .route("/recordings", get(recordings::list_recordings))
        .route(
            "/recordings/{name}",
            get(recordings::download_recording).delete(recordings::delete_recording),
        )
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

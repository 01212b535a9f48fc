pub mod auth;
pub mod error;
pub mod export;
pub mod middleware;
pub mod pages;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use crate::auth::AppState;

/// Full API router: public auth endpoints plus the token-protected
/// landing-page routes.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/guest", post(auth::guest))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/pages", get(pages::list_pages).post(pages::create_page))
        .route(
            "/pages/{id}",
            get(pages::get_page)
                .patch(pages::update_page)
                .delete(pages::delete_page),
        )
        .route("/pages/{id}/duplicate", post(pages::duplicate_page))
        .route("/pages/{id}/archive", post(pages::archive_page))
        .route("/pages/{id}/unarchive", post(pages::unarchive_page))
        .route("/pages/{id}/export", get(export::export_page))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

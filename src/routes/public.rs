use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token: the auth gateway and read-only news access.
///
/// Every news read here passes `Visibility::Active` to the repository, so soft-deleted
/// items never leak to anonymous clients.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/register
        // Creates a regular account. 400 when the username or email is taken.
        .route("/auth/register", post(handlers::register_user))
        // POST /auth/token
        // Form login (username or email + password); returns a bearer token.
        .route("/auth/token", post(handlers::login))
        // GET /news?page=&limit=&q=
        // Paginated listing of live news, optionally filtered by a search term.
        .route("/news", get(handlers::list_news))
        // GET /news/{id}
        // A single live item, 404 when missing or soft-deleted.
        .route("/news/{id}", get(handlers::get_news))
}

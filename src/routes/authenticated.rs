use crate::{AppState, handlers, media::MAX_UPLOAD_BYTES};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};

// Headroom over the image limit so an oversized file reaches the handler and is
// reported as `too_large` instead of a bare 413 from the body limit.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES * 2;

/// Authenticated Router Module
///
/// Routes for any user holding a valid token. Each handler takes the `AuthUser`
/// extractor, and the owner-or-admin rule for edits and deletes is enforced by the
/// repository inside the same transaction as the write.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /auth/profile
        // The current user's public view.
        .route("/auth/profile", get(handlers::get_profile))
        // POST /news
        // Creates an item owned by the requester.
        .route("/news", post(handlers::create_news))
        // PUT/DELETE /news/{id}
        // Partial update and soft delete. Creator or admin only.
        .route(
            "/news/{id}",
            put(handlers::update_news).delete(handlers::delete_news),
        )
        // POST /news/upload
        // Multipart image upload (field `image`, at most 5 MiB).
        .route(
            "/news/upload",
            post(handlers::upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}

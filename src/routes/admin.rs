use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Admin Router Module
///
/// Moderation endpoints, nested under `/admin`. Every handler takes the `AdminUser`
/// extractor, which resolves the current user and then requires the admin flag:
/// 401 without a valid token, 403 for a non-admin.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/news?include_deleted=true
        // Listing that can also return soft-deleted items.
        .route("/news", get(handlers::admin_list_news))
        // DELETE /admin/news/{id}/force
        // Permanent removal regardless of soft-delete state.
        .route("/news/{id}/force", delete(handlers::force_delete_news))
        // POST /admin/news/{id}/restore
        // Clears `deleted_at` on a soft-deleted item.
        .route("/news/{id}/restore", post(handlers::restore_news))
        // GET /admin/users
        // Paginated user list, newest first.
        .route("/users", get(handlers::admin_list_users))
}

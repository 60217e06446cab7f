use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{CreateNewsRequest, NewUser, NewsRecord, RegisterUserRequest, UpdateNewsRequest, User},
    pagination::{NewsFilter, Page, Visibility},
    password::hash_password,
};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Repository Trait
///
/// The persistence contract behind every handler. Both implementations must agree on
/// the semantics documented here; the in-memory one exists so those semantics can be
/// exercised without a database.
///
/// Every news read takes an explicit `Visibility`. Mutations that need the owner-or-admin
/// rule take the requester and enforce it inside the same unit of work as the write.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> Result<Option<User>>;
    /// Single lookup matching either the username or the email.
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>>;
    async fn username_exists(&self, username: &str) -> Result<bool>;
    async fn email_exists(&self, email: &str) -> Result<bool>;
    /// Inserts a user. A uniqueness race surfaces as `UsernameTaken` / `EmailTaken`.
    async fn create_user(&self, user: NewUser) -> Result<User>;
    /// Newest first.
    async fn list_users(&self, page: Page) -> Result<Vec<User>>;

    // --- News ---
    /// One page of matching news (newest first, id as tie-break) and the total match count.
    async fn list_news(&self, filter: &NewsFilter) -> Result<(Vec<NewsRecord>, i64)>;
    async fn get_news(&self, id: i64, visibility: Visibility) -> Result<Option<NewsRecord>>;
    async fn create_news(&self, req: CreateNewsRequest, creator_id: i64) -> Result<NewsRecord>;
    /// Partial update of a non-deleted item. `NotFound`, then `Forbidden`, then the write.
    async fn update_news(
        &self,
        id: i64,
        patch: UpdateNewsRequest,
        requester: &AuthUser,
    ) -> Result<NewsRecord>;
    /// Stamps `deleted_at`. A second call on the same id is `NotFound`.
    async fn soft_delete_news(&self, id: i64, requester: &AuthUser) -> Result<()>;
    /// Clears `deleted_at`; only soft-deleted items qualify.
    async fn restore_news(&self, id: i64) -> Result<NewsRecord>;
    /// Removes the row whatever its soft-delete state.
    async fn hard_delete_news(&self, id: i64) -> Result<()>;

    /// register
    ///
    /// Validates the payload, probes username then email, and stores an Argon2 hash of the
    /// password. Never stores or returns the raw password.
    async fn register(&self, req: RegisterUserRequest) -> Result<User> {
        req.validate()?;
        let username = req.username.trim().to_string();
        let email = req.email.trim().to_string();

        if self.username_exists(&username).await? {
            return Err(AppError::UsernameTaken);
        }
        if self.email_exists(&email).await? {
            return Err(AppError::EmailTaken);
        }

        let hashed_password = hash_password(&req.password)?;
        let user = self
            .create_user(NewUser {
                username,
                email,
                hashed_password,
                is_admin: false,
            })
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "user registered");
        Ok(user)
    }
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Turns a unique-constraint violation from `users` into the matching conflict error.
pub(crate) fn map_user_conflict(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => match db.constraint() {
            Some(name) if name.contains("email") => AppError::EmailTaken,
            _ => AppError::UsernameTaken,
        },
        _ => AppError::Database(err),
    }
}

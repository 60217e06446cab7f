use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use super::{Repository, map_user_conflict};
use crate::{
    auth::{AuthUser, ensure_owner_or_admin},
    error::{AppError, Result},
    models::{CreateNewsRequest, NewUser, NewsRecord, UpdateNewsRequest, User},
    pagination::{NewsFilter, Page, Visibility},
};

const USER_COLUMNS: &str =
    "id, username, email, hashed_password, is_admin, created_at, updated_at";

const NEWS_SELECT: &str = r#"
    SELECT n.id, n.title, n.description, n.image_url, n.creator_id,
           n.created_at, n.updated_at, n.deleted_at,
           u.username AS creator_username
    FROM news n
    LEFT JOIN users u ON u.id = n.creator_id
    WHERE TRUE
"#;

/// PostgresRepository
///
/// The `Repository` backed by PostgreSQL. Multi-statement operations run in a single
/// transaction, so the row re-read after a write is the row that was written.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn push_visibility(builder: &mut QueryBuilder<'_, Postgres>, visibility: Visibility) {
    match visibility {
        Visibility::Active => {
            builder.push(" AND n.deleted_at IS NULL");
        }
        Visibility::IncludeDeleted => {}
        Visibility::DeletedOnly => {
            builder.push(" AND n.deleted_at IS NOT NULL");
        }
    }
}

/// Escapes LIKE metacharacters so the query is matched as a literal substring.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &NewsFilter) {
    push_visibility(builder, filter.visibility);
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        builder.push(" AND (n.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR n.description ILIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\')");
    }
}

async fn fetch_news(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    visibility: Visibility,
) -> Result<Option<NewsRecord>> {
    let mut builder = QueryBuilder::<Postgres>::new(NEWS_SELECT);
    builder.push(" AND n.id = ");
    builder.push_bind(id);
    push_visibility(&mut builder, visibility);
    Ok(builder
        .build_query_as::<NewsRecord>()
        .fetch_optional(&mut **tx)
        .await?)
}

/// Locks a live row and returns its creator.
async fn lock_active_creator(tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT creator_id FROM news WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(AppError::NotFound("News"))
}

fn vanished(id: i64) -> AppError {
    AppError::Internal(format!("news {id} could not be re-read after write"))
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>> {
        // A username match wins if one account's username equals another's email.
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE username = $1 OR email = $1
             ORDER BY (username = $1) DESC
             LIMIT 1"
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn username_exists(&self, username: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, hashed_password, is_admin)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(user.is_admin)
        .fetch_one(&self.pool)
        .await
        .map_err(map_user_conflict)
    }

    async fn list_users(&self, page: Page) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             ORDER BY created_at DESC, id DESC
             LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Count and page are read in one transaction so `total` describes the same
    /// snapshot as `items`.
    async fn list_news(&self, filter: &NewsFilter) -> Result<(Vec<NewsRecord>, i64)> {
        let mut tx = self.pool.begin().await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM news n WHERE TRUE");
        push_filters(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&mut *tx)
            .await?;

        let mut select = QueryBuilder::<Postgres>::new(NEWS_SELECT);
        push_filters(&mut select, filter);
        select.push(" ORDER BY n.created_at DESC, n.id DESC LIMIT ");
        select.push_bind(filter.page.limit());
        select.push(" OFFSET ");
        select.push_bind(filter.page.offset());
        let items = select
            .build_query_as::<NewsRecord>()
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((items, total))
    }

    async fn get_news(&self, id: i64, visibility: Visibility) -> Result<Option<NewsRecord>> {
        let mut builder = QueryBuilder::<Postgres>::new(NEWS_SELECT);
        builder.push(" AND n.id = ");
        builder.push_bind(id);
        push_visibility(&mut builder, visibility);
        Ok(builder
            .build_query_as::<NewsRecord>()
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_news(&self, req: CreateNewsRequest, creator_id: i64) -> Result<NewsRecord> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO news (title, description, image_url, creator_id)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(&req.title)
        .bind(&req.description)
        .bind(&req.image_url)
        .bind(creator_id)
        .fetch_one(&mut *tx)
        .await?;

        let record = fetch_news(&mut tx, id, Visibility::Active)
            .await?
            .ok_or_else(|| vanished(id))?;
        tx.commit().await?;
        Ok(record)
    }

    async fn update_news(
        &self,
        id: i64,
        patch: UpdateNewsRequest,
        requester: &AuthUser,
    ) -> Result<NewsRecord> {
        patch.validate()?;
        let mut tx = self.pool.begin().await?;

        let creator_id = lock_active_creator(&mut tx, id).await?;
        ensure_owner_or_admin(requester, creator_id)?;

        let mut update = QueryBuilder::<Postgres>::new("UPDATE news SET updated_at = NOW()");
        if let Some(Some(title)) = &patch.title {
            update.push(", title = ");
            update.push_bind(title.clone());
        }
        if let Some(Some(description)) = &patch.description {
            update.push(", description = ");
            update.push_bind(description.clone());
        }
        if let Some(image_url) = &patch.image_url {
            update.push(", image_url = ");
            update.push_bind(image_url.clone());
        }
        update.push(" WHERE id = ");
        update.push_bind(id);
        update.build().execute(&mut *tx).await?;

        let record = fetch_news(&mut tx, id, Visibility::Active)
            .await?
            .ok_or_else(|| vanished(id))?;
        tx.commit().await?;
        Ok(record)
    }

    async fn soft_delete_news(&self, id: i64, requester: &AuthUser) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let creator_id = lock_active_creator(&mut tx, id).await?;
        ensure_owner_or_admin(requester, creator_id)?;

        sqlx::query("UPDATE news SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn restore_news(&self, id: i64) -> Result<NewsRecord> {
        let mut tx = self.pool.begin().await?;

        let restored = sqlx::query(
            "UPDATE news SET deleted_at = NULL, updated_at = NOW()
             WHERE id = $1 AND deleted_at IS NOT NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if restored.rows_affected() == 0 {
            return Err(AppError::NotFound("Deleted news"));
        }

        let record = fetch_news(&mut tx, id, Visibility::Active)
            .await?
            .ok_or_else(|| vanished(id))?;
        tx.commit().await?;
        Ok(record)
    }

    async fn hard_delete_news(&self, id: i64) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM news WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound("News"));
        }
        Ok(())
    }
}

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    config::MediaConfig,
    error::{AppError, Result},
    media::resolve_public_url,
};

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const USERNAME_MAX_CHARS: usize = 50;
pub const EMAIL_MAX_CHARS: usize = 255;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles"));

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Canonical row from the `users` table. Deliberately not `Serialize`: the password
/// hash must only ever leave the repository inside this struct. Responses use `UserResponse`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input to `Repository::create_user`; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub is_admin: bool,
}

/// NewsRecord
///
/// A `news` row joined with its creator's username. `creator_username` is filled by
/// the repository query (LEFT JOIN) and is never written back.
#[derive(Debug, Clone, FromRow, Default)]
pub struct NewsRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub creator_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub creator_username: Option<String>,
}

// --- Response Schemas (Output) ---

/// UserResponse
///
/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserResponse {
    #[ts(type = "number")]
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_admin: user.is_admin,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// News
///
/// The enriched record returned by every news endpoint: `image_url` is fully
/// resolved and `creator_username` is the joined display name (null when the
/// creator row is gone).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct News {
    #[ts(type = "number")]
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    #[ts(type = "number")]
    pub creator_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub creator_username: Option<String>,
    // Only present on soft-deleted items, which only the admin listing can return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl NewsRecord {
    /// Builds the response view: resolves `image_url` against the media config and
    /// carries over the joined creator name.
    pub fn into_news(self, media: &MediaConfig) -> News {
        News {
            image_url: resolve_public_url(media, self.image_url.as_deref()),
            id: self.id,
            title: self.title,
            description: self.description,
            creator_id: self.creator_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            creator_username: self.creator_username,
            deleted_at: self.deleted_at,
        }
    }
}

/// NewsListResponse
///
/// One page of news plus the count of every matching row.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NewsListResponse {
    pub items: Vec<News>,
    #[ts(type = "number")]
    pub total: i64,
    #[ts(type = "number")]
    pub page: i64,
    #[ts(type = "number")]
    pub limit: i64,
    #[ts(type = "number")]
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// UploadResponse
///
/// `filename` is the stored name, usable as `image_url` on a news item;
/// `url` is where the hosting layer serves it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UploadResponse {
    pub filename: String,
    pub url: String,
}

// --- Request Payloads (Input Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterUserRequest {
    pub fn validate(&self) -> Result<()> {
        let username_len = self.username.trim().chars().count();
        if username_len == 0 || username_len > USERNAME_MAX_CHARS {
            return Err(AppError::validation(format!(
                "username must be between 1 and {USERNAME_MAX_CHARS} characters"
            )));
        }
        let email = self.email.trim();
        if email.chars().count() > EMAIL_MAX_CHARS || !EMAIL_RE.is_match(email) {
            return Err(AppError::validation("email is not a valid address"));
        }
        if self.password.is_empty() {
            return Err(AppError::validation("password must not be empty"));
        }
        Ok(())
    }
}

/// OAuth2 password-form login. `username` accepts either a username or an email.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateNewsRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CreateNewsRequest {
    pub fn validate(&self) -> Result<()> {
        validate_title(&self.title)?;
        validate_description(&self.description)
    }
}

/// UpdateNewsRequest
///
/// Partial update. The outer `Option` records whether the field was present in the
/// payload at all; the inner one whether it was `null`. Absent fields are left
/// untouched, `"image_url": null` clears the image.
#[derive(Debug, Clone, Deserialize, ToSchema, Default)]
pub struct UpdateNewsRequest {
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub title: Option<Option<String>>,

    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>, nullable)]
    pub image_url: Option<Option<String>>,
}

impl UpdateNewsRequest {
    pub fn validate(&self) -> Result<()> {
        match &self.title {
            Some(None) => return Err(AppError::validation("title cannot be null")),
            Some(Some(title)) => validate_title(title)?,
            None => {}
        }
        match &self.description {
            Some(None) => Err(AppError::validation("description cannot be null")),
            Some(Some(description)) => validate_description(description),
            None => Ok(()),
        }
    }

    /// Applies the patch to an in-memory record. Callers validate first.
    pub fn apply_to(&self, record: &mut NewsRecord) {
        if let Some(Some(title)) = &self.title {
            record.title = title.clone();
        }
        if let Some(Some(description)) = &self.description {
            record.description = description.clone();
        }
        if let Some(image_url) = &self.image_url {
            record.image_url = image_url.clone();
        }
    }
}

/// Marks a field as present even when its value is `null`.
fn present<'de, T, D>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn validate_title(title: &str) -> Result<()> {
    bounded("title", title, TITLE_MAX_CHARS)
}

fn validate_description(description: &str) -> Result<()> {
    bounded("description", description, DESCRIPTION_MAX_CHARS)
}

fn bounded(field: &str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if value.trim().is_empty() || len > max {
        return Err(AppError::validation(format!(
            "{field} must be between 1 and {max} characters"
        )));
    }
    Ok(())
}

use crate::{
    AppState,
    auth::{self, AdminUser, AuthUser},
    error::{AppError, Result},
    media::{self, MAX_UPLOAD_BYTES},
    models::{
        CreateNewsRequest, LoginForm, News, NewsListResponse, NewsRecord, RegisterUserRequest,
        TokenResponse, UpdateNewsRequest, UploadResponse, UserResponse,
    },
    pagination::{NewsFilter, Page, PageParams, Visibility},
};
use axum::{
    Form, Json,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};

// --- Query Structs ---

/// NewsQuery
///
/// Accepted query parameters for the public news listing (GET /news).
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct NewsQuery {
    /// Page number, starting at 1 (default 1).
    pub page: Option<i64>,
    /// Items per page, 1 to 100 (default 10).
    pub limit: Option<i64>,
    /// Case-insensitive substring matched against title or description.
    pub q: Option<String>,
}

/// AdminNewsQuery
///
/// `NewsQuery` plus the admin-only switch for soft-deleted items.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct AdminNewsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub q: Option<String>,
    /// Also return soft-deleted items (default false).
    #[serde(default)]
    pub include_deleted: bool,
}

/// Multipart body of the upload endpoint, for the API docs only.
#[derive(utoipa::ToSchema)]
#[allow(dead_code)]
pub struct ImageUpload {
    #[schema(value_type = String, format = Binary)]
    image: Vec<u8>,
}

fn page_of(page: Option<i64>, limit: Option<i64>) -> Result<Page> {
    Page::try_from(PageParams { page, limit })
}

fn news_page(
    state: &AppState,
    page: Page,
    records: Vec<NewsRecord>,
    total: i64,
) -> NewsListResponse {
    NewsListResponse {
        items: records
            .into_iter()
            .map(|record| record.into_news(&state.config.media))
            .collect(),
        total,
        page: page.page(),
        limit: page.limit(),
        total_pages: page.total_pages(total),
    }
}

// --- Service Handlers ---

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Welcome message"))
)]
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to FeedNews API" }))
}

/// health
///
/// Liveness probe for load balancers. Does not touch the database.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

// --- Auth Handlers ---

/// register_user
///
/// [Public Route] Creates a regular (non-admin) account. Username is probed before email,
/// so a payload clashing on both reports `UsernameTaken`.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = UserResponse),
        (status = 400, description = "Username or email taken, or invalid input")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let user = state.repo.register(payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// login
///
/// [Public Route] OAuth2 password flow. The `username` form field may hold an email.
#[utoipa::path(
    post,
    path = "/api/v1/auth/token",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Bearer token", body = TokenResponse),
        (status = 401, description = "Incorrect username or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>> {
    let (_, token) =
        auth::authenticate(&state.repo, &state.config.jwt, &form.username, &form.password).await?;
    Ok(Json(TokenResponse::bearer(token)))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/profile",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_profile(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}

// --- News Handlers ---

/// list_news
///
/// [Public Route] Paginated, newest-first listing of live news. Soft-deleted items are
/// never returned here.
#[utoipa::path(
    get,
    path = "/api/v1/news",
    params(NewsQuery),
    responses(
        (status = 200, description = "One page of news", body = NewsListResponse),
        (status = 400, description = "page or limit out of range")
    )
)]
pub async fn list_news(
    State(state): State<AppState>,
    Query(query): Query<NewsQuery>,
) -> Result<Json<NewsListResponse>> {
    let page = page_of(query.page, query.limit)?;
    let filter = NewsFilter::new(page, query.q, Visibility::Active);
    let (records, total) = state.repo.list_news(&filter).await?;
    Ok(Json(news_page(&state, page, records, total)))
}

#[utoipa::path(
    get,
    path = "/api/v1/news/{id}",
    params(("id" = i64, Path, description = "News ID")),
    responses(
        (status = 200, description = "Found", body = News),
        (status = 404, description = "Missing or soft-deleted")
    )
)]
pub async fn get_news(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<News>> {
    let record = state
        .repo
        .get_news(id, Visibility::Active)
        .await?
        .ok_or(AppError::NotFound("News"))?;
    Ok(Json(record.into_news(&state.config.media)))
}

/// create_news
///
/// [Authenticated Route] The creator is always the requesting user.
#[utoipa::path(
    post,
    path = "/api/v1/news",
    request_body = CreateNewsRequest,
    responses(
        (status = 201, description = "Created", body = News),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_news(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateNewsRequest>,
) -> Result<(StatusCode, Json<News>)> {
    payload.validate()?;
    let record = state.repo.create_news(payload, user.id()).await?;
    tracing::info!(news_id = record.id, user_id = user.id(), "news created");
    Ok((
        StatusCode::CREATED,
        Json(record.into_news(&state.config.media)),
    ))
}

/// update_news
///
/// [Authenticated Route] Partial update. Only the creator or an admin may edit, and only
/// while the item is not soft-deleted.
#[utoipa::path(
    put,
    path = "/api/v1/news/{id}",
    params(("id" = i64, Path, description = "News ID")),
    request_body = UpdateNewsRequest,
    responses(
        (status = 200, description = "Updated", body = News),
        (status = 403, description = "Not creator or admin"),
        (status = 404, description = "Missing or soft-deleted")
    )
)]
pub async fn update_news(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<UpdateNewsRequest>,
) -> Result<Json<News>> {
    let record = state.repo.update_news(id, patch, &user).await?;
    tracing::info!(news_id = id, user_id = user.id(), "news updated");
    Ok(Json(record.into_news(&state.config.media)))
}

/// delete_news
///
/// [Authenticated Route] Soft delete. A second call on the same id is a 404.
#[utoipa::path(
    delete,
    path = "/api/v1/news/{id}",
    params(("id" = i64, Path, description = "News ID")),
    responses(
        (status = 204, description = "Soft-deleted"),
        (status = 403, description = "Not creator or admin"),
        (status = 404, description = "Missing or already deleted")
    )
)]
pub async fn delete_news(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.repo.soft_delete_news(id, &user).await?;
    tracing::info!(news_id = id, user_id = user.id(), "news soft-deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::TooLarge {
            limit: MAX_UPLOAD_BYTES,
        }
    } else {
        AppError::validation(format!("malformed multipart body: {}", err.body_text()))
    }
}

/// upload_image
///
/// [Authenticated Route] Accepts one image in the multipart field `image`. The returned
/// `filename` can be used as a news `image_url`.
#[utoipa::path(
    post,
    path = "/api/v1/news/upload",
    request_body(content = ImageUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Stored", body = UploadResponse),
        (status = 400, description = "Not an image, or larger than 5 MiB")
    )
)]
pub async fn upload_image(
    user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }

        let content_type = field.content_type().map(str::to_owned);
        let file_name = field.file_name().map(str::to_owned);
        let data = field.bytes().await.map_err(multipart_error)?;

        let uploaded = media::upload(
            &state.storage,
            &state.config.media,
            &data,
            content_type.as_deref(),
            file_name.as_deref(),
        )
        .await?;
        tracing::info!(user_id = user.id(), filename = %uploaded.filename, "image uploaded");
        return Ok((StatusCode::CREATED, Json(uploaded)));
    }

    Err(AppError::validation("multipart field 'image' is required"))
}

// --- Admin Handlers ---

/// admin_list_news
///
/// [Admin Route] Same listing as the public one; `include_deleted=true` also returns
/// soft-deleted items, with their `deleted_at`.
#[utoipa::path(
    get,
    path = "/api/v1/admin/news",
    params(AdminNewsQuery),
    responses(
        (status = 200, description = "One page of news", body = NewsListResponse),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn admin_list_news(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<AdminNewsQuery>,
) -> Result<Json<NewsListResponse>> {
    let page = page_of(query.page, query.limit)?;
    let visibility = if query.include_deleted {
        Visibility::IncludeDeleted
    } else {
        Visibility::Active
    };
    let filter = NewsFilter::new(page, query.q, visibility);
    let (records, total) = state.repo.list_news(&filter).await?;
    Ok(Json(news_page(&state, page, records, total)))
}

/// force_delete_news
///
/// [Admin Route] Permanent removal, whether or not the item was soft-deleted.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/news/{id}/force",
    params(("id" = i64, Path, description = "News ID")),
    responses(
        (status = 204, description = "Removed"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn force_delete_news(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.repo.hard_delete_news(id).await?;
    tracing::info!(news_id = id, admin_id = admin.id, "news permanently deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/news/{id}/restore",
    params(("id" = i64, Path, description = "News ID")),
    responses(
        (status = 200, description = "Restored", body = News),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "No soft-deleted item with this id")
    )
)]
pub async fn restore_news(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<News>> {
    let record = state.repo.restore_news(id).await?;
    tracing::info!(news_id = id, admin_id = admin.id, "news restored");
    Ok(Json(record.into_news(&state.config.media)))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    params(PageParams),
    responses(
        (status = 200, description = "Users, newest first", body = [UserResponse]),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn admin_list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<UserResponse>>> {
    let page = Page::try_from(params)?;
    let users = state.repo.list_users(page).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

use axum::{Router, extract::FromRef, http::HeaderName, routing::get};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod media;
pub mod models;
pub mod pagination;
pub mod password;
pub mod repository;
pub mod storage;

// Routing split by access level (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{LocalStorage, MockStorageService, StorageState};

/// Prefix every API route is nested under.
pub const API_PREFIX: &str = "/api/v1";

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::root, handlers::health,
        handlers::register_user, handlers::login, handlers::get_profile,
        handlers::list_news, handlers::get_news, handlers::create_news,
        handlers::update_news, handlers::delete_news, handlers::upload_image,
        handlers::admin_list_news, handlers::force_delete_news, handlers::restore_news,
        handlers::admin_list_users
    ),
    components(
        schemas(
            models::UserResponse, models::News, models::NewsListResponse,
            models::TokenResponse, models::UploadResponse, models::RegisterUserRequest,
            models::LoginForm, models::CreateNewsRequest, models::UpdateNewsRequest,
            handlers::ImageUpload,
        )
    ),
    tags(
        (name = "feednews", description = "FeedNews content API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared container for every service a handler may need. Cloned per request;
/// all members are cheap handles.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: users and news, Postgres in production.
    pub repo: RepositoryState,
    /// Storage Layer: where uploaded images are written.
    pub storage: StorageState,
    /// Configuration: loaded once at startup, never mutated.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Lets extractors such as `AuthUser` pull single components out of `AppState`.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing tree, applies the observability layers, and registers state.
///
/// - `/api/v1/...`: the public, authenticated and admin routers
/// - `/{upload_path}/...`: uploaded files, served straight from the upload directory
/// - `/`, `/health`: service endpoints
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. API Router Assembly
    let api = Router::new()
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .nest("/admin", admin::admin_routes());

    let upload_path = state.config.media.upload_path.trim_matches('/').to_string();
    let uploads = ServeDir::new(&state.config.media.upload_dir);

    let mut base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest(API_PREFIX, api);

    // Uploads cannot be mounted at the root; an empty path disables static serving.
    if !upload_path.is_empty() {
        base_router = base_router.nest_service(&format!("/{upload_path}"), uploads);
    }
    let base_router = base_router.with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request, tagged with the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, uri and the `x-request-id` set by the layer
/// above, so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

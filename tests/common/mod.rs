#![allow(dead_code)]

use feednews::{
    AppConfig, AppState, InMemoryRepository, MockStorageService,
    auth::{AuthUser, issue_token},
    models::{CreateNewsRequest, NewUser, NewsRecord, RegisterUserRequest, User},
    password::hash_password,
    repository::{Repository, RepositoryState},
    storage::StorageState,
};
use std::sync::Arc;

pub const PASSWORD: &str = "password123";

/// Shared fixture: an in-memory repository plus the state built around it.
pub struct TestContext {
    pub repo: Arc<InMemoryRepository>,
    pub state: AppState,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_storage(Arc::new(MockStorageService::new()))
    }

    pub fn with_storage(storage: StorageState) -> Self {
        Self::with(storage, AppConfig::default())
    }

    pub fn with(storage: StorageState, config: AppConfig) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let state = AppState {
            repo: repo.clone() as RepositoryState,
            storage,
            config,
        };
        Self { repo, state }
    }

    /// Registers a regular user through the same path as `POST /auth/register`.
    pub async fn user(&self, username: &str) -> User {
        self.repo
            .register(RegisterUserRequest {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password: PASSWORD.to_string(),
            })
            .await
            .expect("registration should succeed")
    }

    pub async fn admin(&self, username: &str) -> User {
        self.repo
            .create_user(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                hashed_password: hash_password(PASSWORD).unwrap(),
                is_admin: true,
            })
            .await
            .expect("admin creation should succeed")
    }

    pub async fn news_by(&self, creator: &User, title: &str, description: &str) -> NewsRecord {
        self.repo
            .create_news(news(title, description), creator.id)
            .await
            .expect("news creation should succeed")
    }

    /// `Authorization` header value for `user`.
    pub fn bearer(&self, user: &User) -> String {
        let token = issue_token(&self.state.config.jwt, user.id).unwrap();
        format!("Bearer {token}")
    }
}

pub fn news(title: &str, description: &str) -> CreateNewsRequest {
    CreateNewsRequest {
        title: title.to_string(),
        description: description.to_string(),
        image_url: None,
    }
}

pub fn as_auth(user: &User) -> AuthUser {
    AuthUser(user.clone())
}

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Mutex, MutexGuard};

use super::Repository;
use crate::{
    auth::{AuthUser, ensure_owner_or_admin},
    error::{AppError, Result},
    models::{CreateNewsRequest, NewUser, NewsRecord, UpdateNewsRequest, User},
    pagination::{NewsFilter, Page, Visibility},
};

#[derive(Default)]
struct Store {
    users: Vec<User>,
    // Stored without `creator_username`; it is joined on every read.
    news: Vec<NewsRecord>,
    next_user_id: i64,
    next_news_id: i64,
}

impl Store {
    fn username_of(&self, user_id: i64) -> Option<String> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.username.clone())
    }

    fn joined(&self, record: &NewsRecord) -> NewsRecord {
        NewsRecord {
            creator_username: self.username_of(record.creator_id),
            ..record.clone()
        }
    }

    fn find_news(&self, id: i64, visibility: Visibility) -> Option<&NewsRecord> {
        self.news
            .iter()
            .find(|n| n.id == id && visibility.admits(n.deleted_at.is_some()))
    }

    fn find_news_mut(&mut self, id: i64, visibility: Visibility) -> Option<&mut NewsRecord> {
        self.news
            .iter_mut()
            .find(|n| n.id == id && visibility.admits(n.deleted_at.is_some()))
    }
}

fn skip_count(page: Page) -> usize {
    usize::try_from(page.offset()).unwrap_or(usize::MAX)
}

fn matches_search(record: &NewsRecord, needle_lower: &str) -> bool {
    record.title.to_lowercase().contains(needle_lower)
        || record.description.to_lowercase().contains(needle_lower)
}

/// InMemoryRepository
///
/// A `Repository` over process memory with the same visibility, ordering, pagination and
/// authorization semantics as `PostgresRepository`. Used by the test suite and for running
/// the API without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> Result<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|_| AppError::Internal("in-memory store lock poisoned".into()))
    }

    /// Drops a user row without touching their news, the way an out-of-band delete would.
    pub fn remove_user(&self, id: i64) -> Result<bool> {
        let mut store = self.store()?;
        let before = store.users.len();
        store.users.retain(|u| u.id != id);
        Ok(store.users.len() != before)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.store()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let store = self.store()?;
        let by_username = store.users.iter().find(|u| u.username == login);
        Ok(by_username
            .or_else(|| store.users.iter().find(|u| u.email == login))
            .cloned())
    }

    async fn username_exists(&self, username: &str) -> Result<bool> {
        Ok(self.store()?.users.iter().any(|u| u.username == username))
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        Ok(self.store()?.users.iter().any(|u| u.email == email))
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut store = self.store()?;
        if store.users.iter().any(|u| u.username == user.username) {
            return Err(AppError::UsernameTaken);
        }
        if store.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::EmailTaken);
        }

        store.next_user_id += 1;
        let now = Utc::now();
        let created = User {
            id: store.next_user_id,
            username: user.username,
            email: user.email,
            hashed_password: user.hashed_password,
            is_admin: user.is_admin,
            created_at: now,
            updated_at: now,
        };
        store.users.push(created.clone());
        Ok(created)
    }

    async fn list_users(&self, page: Page) -> Result<Vec<User>> {
        let store = self.store()?;
        let mut users: Vec<&User> = store.users.iter().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(users
            .into_iter()
            .skip(skip_count(page))
            .take(page.limit() as usize)
            .cloned()
            .collect())
    }

    async fn list_news(&self, filter: &NewsFilter) -> Result<(Vec<NewsRecord>, i64)> {
        let store = self.store()?;
        let needle = filter.search.as_ref().map(|q| q.to_lowercase());

        let mut matching: Vec<&NewsRecord> = store
            .news
            .iter()
            .filter(|n| filter.visibility.admits(n.deleted_at.is_some()))
            .filter(|n| needle.as_deref().is_none_or(|q| matches_search(n, q)))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(skip_count(filter.page))
            .take(filter.page.limit() as usize)
            .map(|n| store.joined(n))
            .collect();
        Ok((items, total))
    }

    async fn get_news(&self, id: i64, visibility: Visibility) -> Result<Option<NewsRecord>> {
        let store = self.store()?;
        Ok(store.find_news(id, visibility).map(|n| store.joined(n)))
    }

    async fn create_news(&self, req: CreateNewsRequest, creator_id: i64) -> Result<NewsRecord> {
        let mut store = self.store()?;
        store.next_news_id += 1;
        let now = Utc::now();
        let record = NewsRecord {
            id: store.next_news_id,
            title: req.title,
            description: req.description,
            image_url: req.image_url,
            creator_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            creator_username: None,
        };
        store.news.push(record.clone());
        Ok(store.joined(&record))
    }

    async fn update_news(
        &self,
        id: i64,
        patch: UpdateNewsRequest,
        requester: &AuthUser,
    ) -> Result<NewsRecord> {
        patch.validate()?;
        let mut store = self.store()?;

        let record = store
            .find_news_mut(id, Visibility::Active)
            .ok_or(AppError::NotFound("News"))?;
        ensure_owner_or_admin(requester, record.creator_id)?;

        patch.apply_to(record);
        record.updated_at = Utc::now();
        let updated = record.clone();
        Ok(store.joined(&updated))
    }

    async fn soft_delete_news(&self, id: i64, requester: &AuthUser) -> Result<()> {
        let mut store = self.store()?;

        let record = store
            .find_news_mut(id, Visibility::Active)
            .ok_or(AppError::NotFound("News"))?;
        ensure_owner_or_admin(requester, record.creator_id)?;

        let now = Utc::now();
        record.deleted_at = Some(now);
        record.updated_at = now;
        Ok(())
    }

    async fn restore_news(&self, id: i64) -> Result<NewsRecord> {
        let mut store = self.store()?;

        let record = store
            .find_news_mut(id, Visibility::DeletedOnly)
            .ok_or(AppError::NotFound("Deleted news"))?;
        record.deleted_at = None;
        record.updated_at = Utc::now();
        let restored = record.clone();
        Ok(store.joined(&restored))
    }

    async fn hard_delete_news(&self, id: i64) -> Result<()> {
        let mut store = self.store()?;
        let before = store.news.len();
        store.news.retain(|n| n.id != id);
        if store.news.len() == before {
            return Err(AppError::NotFound("News"));
        }
        Ok(())
    }
}

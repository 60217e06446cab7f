use serde::Deserialize;

use crate::error::{AppError, Result};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Raw `page` / `limit` query parameters as they arrive on the wire.
#[derive(Debug, Clone, Copy, Default, Deserialize, utoipa::IntoParams)]
pub struct PageParams {
    /// Page number, starting at 1.
    pub page: Option<i64>,
    /// Items per page, 1 to 100.
    pub limit: Option<i64>,
}

/// Page
///
/// A validated page window. Out-of-range input is rejected here, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: i64,
    limit: i64,
}

impl Page {
    pub fn new(page: i64, limit: i64) -> Result<Self> {
        if page < 1 {
            return Err(AppError::validation("page must be at least 1"));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Rows to skip. Saturates, so a page far past the data is simply empty.
    pub fn offset(&self) -> i64 {
        (self.page - 1).checked_mul(self.limit).unwrap_or(i64::MAX)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        total_pages(total, self.limit)
    }
}

impl TryFrom<PageParams> for Page {
    type Error = AppError;

    fn try_from(params: PageParams) -> Result<Self> {
        Page::new(
            params.page.unwrap_or(DEFAULT_PAGE),
            params.limit.unwrap_or(DEFAULT_LIMIT),
        )
    }
}

/// ceil(total / limit), and 0 when nothing matched.
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if total <= 0 || limit <= 0 {
        0
    } else {
        (total + limit - 1) / limit
    }
}

/// Visibility
///
/// Which rows a news read may see with respect to soft deletion. Every read path on the
/// repository takes one explicitly; there is no implicit default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// `deleted_at IS NULL`: the public view.
    Active,
    /// No soft-delete filter. Admin listing only.
    IncludeDeleted,
    /// `deleted_at IS NOT NULL`: restore candidates.
    DeletedOnly,
}

impl Visibility {
    pub fn admits(&self, deleted: bool) -> bool {
        match self {
            Visibility::Active => !deleted,
            Visibility::IncludeDeleted => true,
            Visibility::DeletedOnly => deleted,
        }
    }
}

/// NewsFilter
///
/// Everything a news listing depends on. `search` is `None` for an absent or empty query;
/// whitespace is searched for like any other text.
#[derive(Debug, Clone)]
pub struct NewsFilter {
    pub page: Page,
    pub search: Option<String>,
    pub visibility: Visibility,
}

impl NewsFilter {
    pub fn new(page: Page, query: Option<String>, visibility: Visibility) -> Self {
        let search = query.filter(|q| !q.is_empty());
        Self {
            page,
            search,
            visibility,
        }
    }
}

//! Offset pagination primitives shared by repositories and the article cache.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page must be at least 1, got {0}")]
    InvalidPage(u32),
    #[error("limit must be between 1 and {MAX_PAGE_LIMIT}, got {0}")]
    InvalidLimit(u32),
}

/// A validated `(page, limit)` pair. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Result<Self, PaginationError> {
        if page == 0 {
            return Err(PaginationError::InvalidPage(page));
        }
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(PaginationError::InvalidLimit(limit));
        }
        Ok(Self { page, limit })
    }

    /// First page with the given limit, clamped into the accepted range.
    pub fn first(limit: u32) -> Self {
        Self {
            page: 1,
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

pub fn total_pages(total: u64, limit: u32) -> u32 {
    if limit == 0 {
        return 0;
    }
    let pages = total.div_ceil(u64::from(limit));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Page of rows as returned by a repository.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoPage<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

impl<T> RepoPage<T> {
    pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            data,
            total,
            page: request.page(),
            total_pages: total_pages(total, request.limit()),
        }
    }
}

/// Paginated envelope served to readers and stored in the listing cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> PaginatedResult<T> {
    pub fn from_repo_page(repo_page: RepoPage<T>, limit: u32) -> Self {
        let RepoPage {
            data,
            total,
            page,
            total_pages,
        } = repo_page;

        Self {
            data,
            total,
            page,
            limit,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

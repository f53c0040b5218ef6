//! Pagination types for list endpoints.
//!
//! The reporting API is page/limit based and returns a meta block the
//! admin frontend consumes directly.

use serde::{Deserialize, Serialize};

/// Query parameters for paginated list endpoints.
#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    /// 1-based page number (default: 1)
    #[serde(default)]
    pub page: Option<i64>,
    /// Maximum number of items per page (default: 20, max: 100)
    #[serde(default)]
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

/// Meta block describing the returned page.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    /// 1-based index of the first row on this page
    pub from: i64,
    /// 1-based index of the last row on this page
    pub to: i64,
    pub total_row: i64,
}

impl PageMeta {
    pub fn new(page: i64, limit: i64, total_row: i64) -> Self {
        let offset = (page - 1) * limit;
        Self {
            page,
            limit,
            from: offset + 1,
            to: (limit * page).min(total_row),
            total_row,
        }
    }
}

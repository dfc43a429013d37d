//! Clamped page arithmetic.

use serde::Serialize;

/// Products per listing page.
pub const PAGE_SIZE: i64 = 12;

/// A resolved page within a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    /// 1-based page number, always within `1..=total_pages`.
    pub number: i64,
    /// At least 1, even for an empty result.
    pub total_pages: i64,
    pub total_count: i64,
    pub per_page: i64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl Page {
    /// Resolve the requested page against `total_count` results.
    ///
    /// Non-numeric and below-one requests give the first page; requests past
    /// the end give the last page.
    #[must_use]
    pub fn clamp(requested: Option<&str>, total_count: i64, per_page: i64) -> Self {
        let per_page = per_page.max(1);
        let total_count = total_count.max(0);
        let total_pages = ((total_count + per_page - 1) / per_page).max(1);

        let number = requested
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .clamp(1, total_pages);

        Self {
            number,
            total_pages,
            total_count,
            per_page,
            has_previous: number > 1,
            has_next: number < total_pages,
        }
    }

    /// Rows to skip before this page.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    #[must_use]
    pub const fn limit(&self) -> i64 {
        self.per_page
    }
}

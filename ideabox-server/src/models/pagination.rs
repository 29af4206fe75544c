//! Pagination types

use serde::{Deserialize, Serialize};

/// Maximum items per page
const MAX_PER_PAGE: u32 = 100;

/// Default items per page
const DEFAULT_PER_PAGE: u32 = 20;

/// Pagination parameters
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    /// Page number (1-indexed)
    pub page: u32,
    /// Items per page (max 100)
    pub per_page: u32,
}

impl Pagination {
    /// Create pagination with validation.
    ///
    /// - Page is clamped to minimum of 1
    /// - Per page is clamped to 1..=100
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Calculate SQL OFFSET value.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    /// Get LIMIT value.
    pub fn limit(&self) -> u32 {
        self.per_page
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Items for current page
    pub items: Vec<T>,
    /// Total count across all pages
    pub total: i64,
    /// Current page number
    pub page: u32,
    /// Items per page
    pub per_page: u32,
}

impl<T> Paginated<T> {
    /// Calculate total number of pages.
    pub fn total_pages(&self) -> u32 {
        let total = self.total.max(0) as u64;
        let pages = total.div_ceil(u64::from(self.per_page.max(1)));
        pages.clamp(1, u64::from(u32::MAX)) as u32
    }

    /// An empty page after the first; the window total is missing here.
    pub fn is_past_end(&self) -> bool {
        self.items.is_empty() && self.page > 1
    }

    /// Check if there's a next page.
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Check if there's a previous page.
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Convert items, keeping the page metadata.
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }

    /// Assemble a page from rows that carry a `COUNT(*) OVER()` total.
    ///
    /// An empty row set yields `total: 0`; callers re-count when
    /// [`Paginated::is_past_end`] holds.
    pub fn from_rows<R>(rows: Vec<R>, page: Pagination, total: impl Fn(&R) -> i64, f: impl FnMut(R) -> T) -> Self {
        let total = rows.first().map(total).unwrap_or(0);
        Self {
            items: rows.into_iter().map(f).collect(),
            total,
            page: page.page,
            per_page: page.per_page,
        }
    }
}

/// Query parameters for pagination
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl From<PaginationParams> for Pagination {
    fn from(params: PaginationParams) -> Self {
        Self::new(
            params.page.unwrap_or(1),
            params.per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_calculation() {
        let p = Pagination::new(1, 10);
        assert_eq!(p.offset(), 0);

        let p = Pagination::new(2, 10);
        assert_eq!(p.offset(), 10);

        let p = Pagination::new(3, 25);
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn offset_does_not_overflow() {
        let p = Pagination::new(u32::MAX, 100);
        assert_eq!(p.offset(), (u64::from(u32::MAX) - 1) * 100);

        let p = Pagination::new(50_000_000, 100);
        assert_eq!(p.offset(), 4_999_999_900);
    }

    #[test]
    fn clamps_page() {
        let p = Pagination::new(0, 10);
        assert_eq!(p.page, 1);
    }

    #[test]
    fn clamps_per_page() {
        let p = Pagination::new(1, 0);
        assert_eq!(p.per_page, 1);

        let p = Pagination::new(1, 999);
        assert_eq!(p.per_page, 100);
    }

    #[test]
    fn total_pages() {
        let paginated: Paginated<()> = Paginated {
            items: vec![],
            total: 0,
            page: 1,
            per_page: 10,
        };
        assert_eq!(paginated.total_pages(), 1);

        let paginated: Paginated<()> = Paginated {
            items: vec![],
            total: 25,
            page: 1,
            per_page: 10,
        };
        assert_eq!(paginated.total_pages(), 3);

        let paginated: Paginated<()> = Paginated {
            items: vec![],
            total: 100,
            page: 1,
            per_page: 10,
        };
        assert_eq!(paginated.total_pages(), 10);

        let paginated: Paginated<()> = Paginated {
            items: vec![],
            total: i64::from(u32::MAX) * 4,
            page: 1,
            per_page: 1,
        };
        assert_eq!(paginated.total_pages(), u32::MAX);
    }

    #[test]
    fn past_end_only_after_first_page() {
        let first: Paginated<()> = Paginated::from_rows(Vec::<(i64, ())>::new(), Pagination::new(1, 10), |r| r.0, |r| r.1);
        assert!(!first.is_past_end());

        let later: Paginated<()> = Paginated::from_rows(Vec::<(i64, ())>::new(), Pagination::new(7, 10), |r| r.0, |r| r.1);
        assert!(later.is_past_end());

        let filled = Paginated::from_rows(vec![(3_i64, 'a')], Pagination::new(2, 1), |r| r.0, |r| r.1);
        assert!(!filled.is_past_end());
    }

    #[test]
    fn map_keeps_metadata() {
        let paginated = Paginated {
            items: vec![1, 2, 3],
            total: 13,
            page: 2,
            per_page: 3,
        };
        let mapped = paginated.map(|n| n.to_string());
        assert_eq!(mapped.items, vec!["1", "2", "3"]);
        assert_eq!(mapped.total, 13);
        assert_eq!(mapped.page, 2);
        assert_eq!(mapped.total_pages(), 5);
    }

    #[test]
    fn from_rows_reads_window_total() {
        let rows = vec![(10_i64, "a"), (10, "b")];
        let page = Pagination::new(1, 2);
        let p = Paginated::from_rows(rows, page, |r| r.0, |r| r.1);
        assert_eq!(p.items, vec!["a", "b"]);
        assert_eq!(p.total, 10);

        let empty: Paginated<&str> = Paginated::from_rows(Vec::<(i64, &str)>::new(), page, |r| r.0, |r| r.1);
        assert_eq!(empty.total, 0);
    }

    #[test]
    fn has_next_prev() {
        let paginated: Paginated<()> = Paginated {
            items: vec![],
            total: 30,
            page: 1,
            per_page: 10,
        };
        assert!(paginated.has_next());
        assert!(!paginated.has_prev());

        let paginated: Paginated<()> = Paginated {
            items: vec![],
            total: 30,
            page: 2,
            per_page: 10,
        };
        assert!(paginated.has_next());
        assert!(paginated.has_prev());

        let paginated: Paginated<()> = Paginated {
            items: vec![],
            total: 30,
            page: 3,
            per_page: 10,
        };
        assert!(!paginated.has_next());
        assert!(paginated.has_prev());
    }
}

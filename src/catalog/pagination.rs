//! Page arithmetic for catalog listings
//!
//! Pages are 1-based. Row ranges are inclusive on both ends, the form
//! range-based REST queries expect.

use serde::{Deserialize, Serialize};

/// Default page size
pub const DEFAULT_PER_PAGE: usize = 24;

/// Largest accepted page size
pub const MAX_PER_PAGE: usize = 100;

/// A page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

impl Pagination {
    /// Build a request, clamping `page` to at least 1 and `per_page` to 1..=100
    pub fn new(page: usize, per_page: usize) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Same request with out-of-range values clamped
    pub fn normalized(self) -> Self {
        Self::new(self.page, self.per_page)
    }

    /// Index of the first row of the page, saturating at `usize::MAX`
    pub fn offset(&self) -> usize {
        (self.page.max(1) - 1).saturating_mul(self.size())
    }

    /// Inclusive `(first, last)` row indices of the page
    pub fn range(&self) -> (usize, usize) {
        let start = self.offset();
        (start, start.saturating_add(self.size() - 1))
    }

    /// Number of pages for `total` rows (0 when there are no rows)
    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.size())
    }

    pub fn has_next(&self, total: usize) -> bool {
        self.page < self.total_pages(total)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    // Deserialized requests may carry an unclamped size
    fn size(&self) -> usize {
        self.per_page.clamp(1, MAX_PER_PAGE)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(default_page(), default_per_page())
    }
}

fn default_page() -> usize { 1 }
fn default_per_page() -> usize { DEFAULT_PER_PAGE }

//! Pagination utilities for service layer
//!
//! Provides a simple `Pagination` struct and helpers to normalize inputs.

/// Pagination parameters
#[derive(Clone, Copy, Debug)]
pub struct Pagination {
    /// 1-based page index
    pub page: u32,
    /// items per page, capped at 100
    pub page_size: u32,
}

impl Pagination {
    /// Clamp to sane defaults and convert to `u64`
    pub fn normalize(self) -> (u64, u64) {
        let page = if self.page == 0 { 1 } else { self.page };
        let page_size = self.page_size.clamp(1, 100);
        ((page - 1) as u64, page_size as u64)
    }
}

impl Default for Pagination {
    fn default() -> Self { Self { page: 1, page_size: 10 } }
}

/// One page of results plus the total row count.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    /// 1-based page index actually served
    pub page: u64,
    pub page_size: u64,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page * self.page_size < self.total
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

#[cfg(test)]
mod tests {
    use super::{Page, Pagination};

    #[test]
    fn normalize_clamps_zero_to_defaults() {
        let (idx, per) = Pagination { page: 0, page_size: 0 }.normalize();
        assert_eq!(idx, 0);
        assert_eq!(per, 1);
    }

    #[test]
    fn normalize_clamps_upper_bound() {
        let (idx, per) = Pagination { page: 5, page_size: 1000 }.normalize();
        assert_eq!(idx, 4);
        assert_eq!(per, 100);
    }

    #[test]
    fn default_values_are_sane() {
        let d = Pagination::default();
        assert_eq!(d.page, 1);
        assert_eq!(d.page_size, 10);
    }

    #[test]
    fn page_links() {
        let page = Page { items: vec![1, 2], total: 25, page: 2, page_size: 10 };
        assert!(page.has_next());
        assert!(page.has_previous());

        let last = Page { items: vec![1], total: 25, page: 3, page_size: 10 };
        assert!(!last.has_next());
        assert!(last.has_previous());

        let only = Page::<i32> { items: vec![], total: 0, page: 1, page_size: 10 };
        assert!(!only.has_next());
        assert!(!only.has_previous());
    }
}

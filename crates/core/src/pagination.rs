//! Offset pagination shared by the user and role listings.

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// A validated page request (`page >= 1`, `limit >= 1`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_LIMIT: u32 = 10;

    pub fn new(page: u32, limit: u32) -> Result<Self, ServiceError> {
        if page < 1 {
            return Err(ServiceError::validation("page must be >= 1"));
        }
        if limit < 1 {
            return Err(ServiceError::validation("limit must be >= 1"));
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Rows to skip: `(page - 1) * limit`.
    pub fn skipped(&self) -> u64 {
        (u64::from(self.page) - 1) * u64::from(self.limit)
    }

    /// Build the response metadata once the collection size is known.
    pub fn meta(&self, total_count: u64) -> PageMeta {
        let skipped = self.skipped();
        let limit = u64::from(self.limit);
        PageMeta {
            skipped,
            limit,
            page: self.page,
            total_count,
            // total - (skipped + limit) > 0, without unsigned underflow
            has_next: total_count > skipped + limit,
            has_prev: skipped > 0,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: Self::DEFAULT_PAGE,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Pagination metadata returned in the envelope `meta` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub skipped: u64,
    pub limit: u64,
    pub page: u32,
    pub total_count: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// A page of records plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_page_with_more_rows_has_next() {
        let meta = PageRequest::new(1, 5).unwrap().meta(10);
        assert_eq!(
            meta,
            PageMeta {
                skipped: 0,
                limit: 5,
                page: 1,
                total_count: 10,
                has_next: true,
                has_prev: false,
            }
        );
    }

    #[test]
    fn exact_fit_has_neither_neighbour() {
        let meta = PageRequest::new(1, 5).unwrap().meta(5);
        assert!(!meta.has_next);
        assert!(!meta.has_prev);
    }

    #[test]
    fn page_past_the_end_only_has_prev() {
        let meta = PageRequest::new(4, 5).unwrap().meta(10);
        assert_eq!(meta.skipped, 15);
        assert!(!meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn zero_page_or_limit_is_rejected() {
        assert!(matches!(PageRequest::new(0, 10), Err(ServiceError::Validation(_))));
        assert!(matches!(PageRequest::new(1, 0), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn meta_serializes_camel_case() {
        let json = serde_json::to_value(PageRequest::default().meta(3)).unwrap();
        assert_eq!(json["totalCount"], 3);
        assert_eq!(json["hasNext"], false);
        assert_eq!(json["hasPrev"], false);
    }

    proptest! {
        #[test]
        fn meta_is_a_function_of_skipped_limit_total(
            page in 1u32..10_000,
            limit in 1u32..10_000,
            total in 0u64..200_000_000,
        ) {
            let req = PageRequest::new(page, limit).unwrap();
            let meta = req.meta(total);

            prop_assert_eq!(meta.skipped, (u64::from(page) - 1) * u64::from(limit));
            let remaining = total as i128 - (meta.skipped as i128 + i128::from(limit));
            prop_assert_eq!(meta.has_next, remaining > 0);
            prop_assert_eq!(meta.has_prev, meta.skipped > 0);
        }
    }
}

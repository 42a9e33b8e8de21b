//! Pagination windows for list queries.
//!
//! A [`RowsRange`] is an `offset`/`limit` window applied after filtering and
//! sorting. Callers that think in page numbers can build one with
//! [`RowsRange::from_page`].

use serde::{Deserialize, Serialize};

/// Offset/limit window over a result set.
///
/// `offset` defaults to none, i.e. results start at the first match.
///
/// # Example
///
/// ```ignore
/// use docaccess::page::RowsRange;
///
/// let range = RowsRange::from_page(3, 20);
/// assert_eq!(range.offset, Some(40));
/// assert_eq!(range.limit, 20);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowsRange {
    /// Number of matching rows to skip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// Maximum number of rows to return.
    pub limit: u64,
}

impl RowsRange {
    /// A window of `limit` rows starting at the first match.
    pub fn limit(limit: u64) -> Self {
        Self { offset: None, limit }
    }

    /// A window of `limit` rows after skipping `offset` matches.
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset: Some(offset), limit }
    }

    /// Converts a 1-indexed page number into a window.
    ///
    /// Page `0` is treated as the first page.
    pub fn from_page(page: u64, per_page: u64) -> Self {
        Self {
            offset: Some(page.saturating_sub(1) * per_page),
            limit: per_page,
        }
    }
}

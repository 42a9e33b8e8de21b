//! List query construction: filter triples, sorting and pagination.
//!
//! A [`Query`] bundles the arguments of the accessor's read operations. It is a
//! transient, request-scoped value.
//!
//! # Query Building
//!
//! ```ignore
//! use docaccess::query::{Query, OrderBy};
//! use docaccess::filter::FilterTriple;
//! use docaccess::page::RowsRange;
//!
//! let query = Query::builder()
//!     .filter(FilterTriple::equal("status", "open"))
//!     .filter(FilterTriple::greater("total", 100))
//!     .order_by(OrderBy::desc("createdAt"))
//!     .rows_range(RowsRange::new(20, 10))
//!     .build();
//! ```

use bson::{Document, doc};
use serde::{Deserialize, Serialize};

use crate::{filter::FilterTriple, page::RowsRange};

/// Single-key sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// The field name to sort by.
    pub field: String,
    /// Sort from the largest value to the smallest.
    #[serde(default, alias = "desc")]
    pub descending: bool,
}

impl OrderBy {
    /// Ascending order on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), descending: false }
    }

    /// Descending order on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), descending: true }
    }

    /// Native sort document (`{ field: 1 }` or `{ field: -1 }`).
    pub fn to_sort_document(&self) -> Document {
        let direction = if self.descending { -1 } else { 1 };

        doc! { self.field.clone(): direction }
    }
}

/// Arguments shared by the accessor's list-style reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Constraints, implicitly ANDed.
    #[serde(default)]
    pub filters: Vec<FilterTriple>,
    /// Optional sort key.
    #[serde(default)]
    pub order_by: Option<OrderBy>,
    /// Optional pagination window.
    #[serde(default)]
    pub rows_range: Option<RowsRange>,
}

impl Query {
    /// Creates a query that matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query from filters alone.
    pub fn filtered(filters: impl IntoIterator<Item = FilterTriple>) -> Self {
        Self { filters: filters.into_iter().collect(), ..Self::default() }
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Backend options derived from the sort and pagination of this query.
    pub fn find_options(&self) -> FindOptions {
        FindOptions {
            sort: self.order_by.clone(),
            skip: self.rows_range.and_then(|range| range.offset),
            limit: self.rows_range.map(|range| range.limit),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Appends a constraint. Order matters: a later triple on the same field
    /// replaces an earlier one.
    pub fn filter(mut self, triple: FilterTriple) -> Self {
        self.query.filters.push(triple);
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.query.order_by = Some(order_by);
        self
    }

    pub fn rows_range(mut self, rows_range: RowsRange) -> Self {
        self.query.rows_range = Some(rows_range);
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// Sort, skip and limit handed to a [`StoreBackend`](crate::backend::StoreBackend) find.
///
/// A `limit` of zero means no limit, as in the store's own protocol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<OrderBy>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

//! Convenient re-exports of commonly used types from docaccess.
//!
//! ```ignore
//! use docaccess::prelude::*;
//! ```

pub use docaccess_core::{
    access::DataAccess,
    backend::{StoreBackend, StoreBackendBuilder},
    config::{MongoConfiguration, StoreConfig},
    error::{DocumentStoreError, DocumentStoreResult},
    filter::{FilterTriple, Operator},
    model::{Model, ModelExt},
    page::RowsRange,
    query::{FindOptions, OrderBy, Query, QueryBuilder},
};

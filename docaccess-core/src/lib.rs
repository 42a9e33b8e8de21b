//! A generic data-access layer over document stores.
//!
//! This crate is the core of the docaccess project and provides:
//!
//! - **Filter compiler** ([`filter`]) - `(field, operator, value)` triples compiled into native predicates
//! - **Queries** ([`query`], [`page`]) - Sorting and pagination arguments for list reads
//! - **Accessor** ([`access`]) - Typed, collection-bound CRUD, grouping and sequencing operations
//! - **Store backend abstraction** ([`backend`]) - The client seam concrete stores implement
//! - **Models** ([`model`]) - Document conversion and internal identifier projection
//! - **Configuration** ([`config`]) - Connection settings and connection-string selection
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docaccess::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Ticket {
//!     pub id: i64,
//!     pub status: String,
//! }
//!
//! let tickets = DataAccess::<Ticket>::new(backend, "tickets");
//! let counts = tickets
//!     .group_by_field_filtered("status", Query::new())
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docaccess_core;

pub mod access;
pub mod backend;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod page;
pub mod query;

//! Main docaccess crate providing a generic data-access layer over document stores.
//!
//! This crate is the primary entry point for users of docaccess. It re-exports the
//! core types from the sub-crates and provides access to the storage backends.
//!
//! # Features
//!
//! - **Filter compiler** - `(field, operator, value)` triples compiled into native predicates
//! - **Typed accessor** - One [`DataAccess`](access::DataAccess) per collection with CRUD,
//!   grouping and sequential id helpers
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docaccess::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Ticket {
//!     pub id: i64,
//!     pub status: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let tickets = DataAccess::<Ticket>::new(backend, "tickets");
//!
//!     let id = tickets.get_next_id(&[]).await?;
//!     tickets.add_item(Ticket { id, status: "open".into() }, None).await;
//!
//!     let open = tickets
//!         .get_all(Query::filtered([FilterTriple::equal("status", "open")]))
//!         .await?;
//!     println!("open tickets: {open:?}");
//!
//!     let by_status = tickets
//!         .group_by_field_filtered("status", Query::new())
//!         .await?;
//!     println!("tickets per status: {by_status:?}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `mongodb` - MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use docaccess_core::{access, backend, config, error, filter, model, page, query};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docaccess_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docaccess_mongodb::{MongoDbStore, MongoDbStoreBuilder, connect};
}

//! In-memory document storage backend for docaccess.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It evaluates the native filter documents the accessor emits, which makes it the
//! backend of choice for development and tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Native filters** - Equality, range, `$in` and `$regex` predicates over dot-paths
//! - **Aggregation** - `$match`, `$sort`, `$skip`, `$limit` and `$group` stages
//! - **Store semantics** - Insertion scan order, generated `ObjectId`s, unique `_id`s
//!
//! # Quick Start
//!
//! ```ignore
//! use docaccess::{access::DataAccess, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub id: i64,
//!     pub name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let users = DataAccess::<User>::new(backend, "users");
//!
//!     users.add_item(User { id: 1, name: "Alice".into() }, None).await;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docaccess_memory;

mod evaluator;
mod pipeline;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};

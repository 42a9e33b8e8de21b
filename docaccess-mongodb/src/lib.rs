//! MongoDB backend implementation for docaccess.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//! Filters, updates and pipelines built by the accessor are already in the
//! driver's native form and are forwarded unchanged.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docaccess = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! A connection is described either by a DSN and database name handed to
//! [`MongoDbStoreBuilder::new`], or by application settings ([`StoreConfig`]) that
//! select an emulator or a managed cluster. Building the store pings the
//! deployment, so an unreachable server fails at startup.
//!
//! # Example
//!
//! ```ignore
//! use docaccess::{config::StoreConfig, mongodb};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoreConfig::from_json_str(&std::fs::read_to_string("settings.json")?)?;
//!     let orders = mongodb::connect::<Order>(&config, "orders").await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docaccess_mongodb;

pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};

use docaccess_core::{
    access::DataAccess,
    backend::StoreBackendBuilder,
    config::StoreConfig,
    error::DocumentStoreResult,
    model::Model,
};

/// Connects to the configured deployment and binds an accessor to `collection`.
///
/// # Errors
///
/// Fails with a configuration error when no host is set, or an initialization
/// error when the client cannot be created or the deployment does not answer.
pub async fn connect<M: Model>(
    config: &StoreConfig,
    collection: &str,
) -> DocumentStoreResult<DataAccess<M>> {
    let store = MongoDbStoreBuilder::from_config(config)?.build().await?;

    Ok(DataAccess::new(store, collection))
}

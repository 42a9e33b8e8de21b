//! Store client abstraction consumed by the accessor.
//!
//! [`StoreBackend`] is the seam between this crate and a concrete document store.
//! A backend is already bound to one database; every call names the collection it
//! targets. Filters, updates and pipelines are passed in the store's native BSON
//! form, so a backend only forwards them (MongoDB) or evaluates them (in-memory).
//!
//! # Examples
//!
//! ```ignore
//! use docaccess::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//! backend.insert_one("orders", doc! { "id": 1, "status": "open" }).await?;
//! let open = backend
//!     .find("orders", doc! { "status": "open" }, Default::default())
//!     .await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Document;
use std::{fmt::Debug, sync::Arc};

use crate::{error::DocumentStoreResult, query::FindOptions};

/// Abstract interface for document store clients.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. Concurrent calls are independent
/// requests with no ordering guarantee between them.
///
/// # Error Handling
///
/// Every failure of the underlying store is reported as an error; the accessor
/// decides which of them reach the caller.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the documents of `collection` matching `filter`, in store scan order
    /// unless `options.sort` is given, windowed by `options.skip`/`options.limit`.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Runs an aggregation pipeline over `collection`.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Inserts one document. A document without `_id` receives a generated one.
    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<()>;

    /// Inserts a batch of documents in one request.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> DocumentStoreResult<()>;

    /// Applies `update` to the first document matching `filter`; with `upsert`, a
    /// new document is inserted when nothing matches.
    ///
    /// Returns the number of matched documents.
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> DocumentStoreResult<u64>;

    /// Applies `update` to every document matching `filter`.
    ///
    /// Returns the number of matched documents.
    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DocumentStoreResult<u64>;

    /// Removes every document matching `filter`, returning how many were removed.
    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64>;

    /// Fast, metadata-based document count of `collection`.
    async fn estimated_document_count(&self, collection: &str) -> DocumentStoreResult<u64>;

    /// Releases client resources. The default implementation is a no-op.
    async fn shutdown(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        (**self)
            .find(collection, filter, options)
            .await
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>> {
        (**self)
            .aggregate(collection, pipeline)
            .await
    }

    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<()> {
        (**self)
            .insert_one(collection, document)
            .await
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> DocumentStoreResult<()> {
        (**self)
            .insert_many(collection, documents)
            .await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> DocumentStoreResult<u64> {
        (**self)
            .update_one(collection, filter, update, upsert)
            .await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DocumentStoreResult<u64> {
        (**self)
            .update_many(collection, filter, update)
            .await
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        (**self)
            .delete_many(collection, filter)
            .await
    }

    async fn estimated_document_count(&self, collection: &str) -> DocumentStoreResult<u64> {
        (**self)
            .estimated_document_count(collection)
            .await
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        (**self).shutdown().await
    }
}

/// Factory for backends whose construction needs I/O, such as connecting a client.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}

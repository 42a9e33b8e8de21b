//! Typed, collection-bound data access.
//!
//! [`DataAccess`] is the long-lived accessor a service keeps per logical
//! collection. It compiles [`FilterTriple`]s into native predicates, issues the
//! resulting commands through a shared [`StoreBackend`], strips the internal
//! `_id` from everything it reads and deserializes the rest into `M`.
//!
//! # Failure policy
//!
//! - Reads, updates and deletes propagate store errors.
//! - [`add_item`](DataAccess::add_item), [`add_or_update_item`](DataAccess::add_or_update_item)
//!   and [`bulk_add_items`](DataAccess::bulk_add_items) are *best-effort*: a failure
//!   is logged and swallowed, and the call still returns its success-shaped value.
//!   Their `try_*` counterparts report the failure instead.
//!
//! # Example
//!
//! ```ignore
//! use docaccess::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! let orders = DataAccess::<Order>::new(InMemoryStore::new(), "orders");
//! orders.add_item(order, Some(&doc! { "id": "o-1" })).await;
//!
//! let open = orders
//!     .get_all(Query::filtered([FilterTriple::equal("status", "open")]))
//!     .await?;
//! let next = orders.get_next_id(&[]).await?;
//! ```

use std::{collections::HashMap, fmt, marker::PhantomData, sync::Arc};

use bson::{Bson, Document, doc, oid::ObjectId};
use serde::Serialize;

use crate::{
    backend::StoreBackend,
    error::{DocumentStoreError, DocumentStoreResult},
    filter::{self, FilterTriple},
    model::{INTERNAL_ID, Model, ModelExt, strip_internal_id, stringify, to_document},
    query::{OrderBy, Query},
    page::RowsRange,
};

/// Field read by [`DataAccess::get_next_id`].
pub const SEQUENTIAL_ID_FIELD: &str = "id";

/// Runs a write whose failure must not reach the caller, logging it instead.
fn best_effort<T>(operation: &str, collection: &str, result: DocumentStoreResult<T>) {
    if let Err(e) = result {
        log::error!("{operation} on collection {collection} failed: {e}");
    }
}

/// Accessor bound to one collection of a document store.
///
/// The backend handle is shared: accessors derived with
/// [`with_collection`](Self::with_collection) or cloned reuse the same client.
/// Rebinding with [`switch_collection`](Self::switch_collection) needs `&mut self`,
/// so it cannot overlap with operations borrowing the same accessor.
pub struct DataAccess<M: Model> {
    backend: Arc<dyn StoreBackend>,
    collection: String,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Model> DataAccess<M> {
    /// Binds a backend to the initial collection.
    pub fn new(backend: impl StoreBackend + 'static, collection: impl Into<String>) -> Self {
        Self::from_shared(Arc::new(backend), collection)
    }

    /// Binds an already shared backend to a collection.
    pub fn from_shared(backend: Arc<dyn StoreBackend>, collection: impl Into<String>) -> Self {
        Self {
            backend,
            collection: collection.into(),
            _marker: PhantomData,
        }
    }

    /// Returns the name of the bound collection.
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Returns the shared backend handle.
    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    /// Points this accessor at another collection of the same database.
    pub fn switch_collection(&mut self, collection: impl Into<String>) {
        self.collection = collection.into();
        log::debug!("data access switched to collection {}", self.collection);
    }

    /// Derives an accessor for another collection and model type sharing this client.
    pub fn with_collection<T: Model>(&self, collection: impl Into<String>) -> DataAccess<T> {
        DataAccess::from_shared(Arc::clone(&self.backend), collection)
    }

    /// Returns `true` when the collection holds no documents, according to the
    /// store's estimated count.
    pub async fn is_empty(&self) -> DocumentStoreResult<bool> {
        Ok(self
            .backend
            .estimated_document_count(&self.collection)
            .await?
            == 0)
    }

    /// Lists the documents matching `query`, sorted and windowed as requested.
    pub async fn get_all(&self, query: Query) -> DocumentStoreResult<Vec<M>> {
        log::debug!("get_all on collection {}", self.collection);

        self.find_models(&query).await
    }

    /// Returns the first document matching every `field == value` pair of `ids`,
    /// or `None` when nothing matches.
    ///
    /// Values go through the filter compiler, so a falsy identifier (such as `0`)
    /// adds no constraint.
    pub async fn get_by_id(&self, ids: &Document) -> DocumentStoreResult<Option<M>> {
        log::debug!("get_by_id on collection {}", self.collection);

        Ok(self
            .find_models(&Query::filtered(filter::id_triples(ids)))
            .await?
            .into_iter()
            .next())
    }

    /// Returns every document whose primary identifier is in the given set and whose
    /// secondary identifiers match exactly.
    ///
    /// # Arguments
    ///
    /// * `ids` - Primary identifier field(s) mapped to arrays of accepted values
    /// * `secondary` - Additional identifier fields mapped to single values
    pub async fn get_by_ids(
        &self,
        ids: &Document,
        secondary: Option<&Document>,
    ) -> DocumentStoreResult<Vec<M>> {
        log::debug!("get_by_ids on collection {}", self.collection);

        self.find_models(&Query::filtered(filter::id_set_triples(ids, secondary)))
            .await
    }

    /// Inserts `item` and returns it, logging instead of reporting any failure.
    ///
    /// When `ids` is given, its first value becomes the document's `_id`; otherwise
    /// the store generates one. The return value does not tell whether the insert
    /// happened.
    pub async fn add_item(&self, item: M, ids: Option<&Document>) -> M {
        best_effort(
            "add_item",
            &self.collection,
            self.try_add_item(&item, ids).await,
        );

        item
    }

    /// Inserts `item`, reporting failures.
    pub async fn try_add_item(&self, item: &M, ids: Option<&Document>) -> DocumentStoreResult<()> {
        log::debug!("add_item on collection {}", self.collection);

        let mut document = item.to_document()?;

        if let Some(id) = first_id(ids) {
            document.insert(INTERNAL_ID, id);
        }

        self.backend
            .insert_one(&self.collection, document)
            .await
    }

    /// Inserts or updates `item` by `_id` and returns it, logging instead of
    /// reporting any failure.
    ///
    /// When `ids` is given, its first value is the `_id` to upsert on; otherwise a
    /// fresh object id is used, which always inserts.
    pub async fn add_or_update_item(&self, item: M, ids: Option<&Document>) -> M {
        best_effort(
            "add_or_update_item",
            &self.collection,
            self.try_add_or_update_item(&item, ids).await,
        );

        item
    }

    /// Inserts or updates `item` by `_id`, reporting failures.
    pub async fn try_add_or_update_item(
        &self,
        item: &M,
        ids: Option<&Document>,
    ) -> DocumentStoreResult<()> {
        log::debug!("add_or_update_item on collection {}", self.collection);

        let id = first_id(ids).unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));

        self.backend
            .update_one(
                &self.collection,
                doc! { INTERNAL_ID: id },
                doc! { "$set": item.to_document()? },
                true,
            )
            .await
            .map(|_| ())
    }

    /// Inserts `items` in one batch, logging instead of reporting any failure.
    ///
    /// With `id_field`, each document's `_id` is the stringified value of that field.
    pub async fn bulk_add_items(&self, items: Vec<M>, id_field: Option<&str>) {
        best_effort(
            "bulk_add_items",
            &self.collection,
            self.try_bulk_add_items(&items, id_field).await,
        );
    }

    /// Inserts `items` in one batch, reporting failures.
    ///
    /// An item lacking `id_field` fails the whole batch before anything is sent.
    pub async fn try_bulk_add_items(
        &self,
        items: &[M],
        id_field: Option<&str>,
    ) -> DocumentStoreResult<()> {
        log::debug!("bulk_add_items on collection {}", self.collection);

        let documents = items
            .iter()
            .map(|item| -> DocumentStoreResult<Document> {
                let mut document = item.to_document()?;

                if let Some(field) = id_field {
                    let id = document
                        .get(field)
                        .map(stringify)
                        .ok_or_else(|| {
                            DocumentStoreError::InvalidDocument(format!("missing id field `{field}`"))
                        })?;
                    document.insert(INTERNAL_ID, id);
                }

                Ok(document)
            })
            .collect::<DocumentStoreResult<Vec<Document>>>()?;

        self.backend
            .insert_many(&self.collection, documents)
            .await
    }

    /// Sets the fields of `partial` on the one document matching every pair of `ids`.
    ///
    /// `ids` is used verbatim as the filter, so unlike the triple-based operations
    /// falsy identifiers still constrain the match. Returns the matched count.
    pub async fn update_item<P>(&self, partial: &P, ids: &Document) -> DocumentStoreResult<u64>
    where
        P: Serialize + Sync + ?Sized,
    {
        log::debug!("update_item on collection {}", self.collection);

        self.backend
            .update_one(
                &self.collection,
                ids.clone(),
                doc! { "$set": to_document(partial)? },
                false,
            )
            .await
    }

    /// Sets the fields of `partial` on every document selected by identifier sets.
    ///
    /// See [`get_by_ids`](Self::get_by_ids) for the shape of `ids` and `secondary`.
    pub async fn update_by_ids<P>(
        &self,
        partial: &P,
        ids: &Document,
        secondary: Option<&Document>,
    ) -> DocumentStoreResult<u64>
    where
        P: Serialize + Sync + ?Sized,
    {
        log::debug!("update_by_ids on collection {}", self.collection);

        self.update_matching(&filter::id_set_triples(ids, secondary), partial)
            .await
    }

    /// Sets the fields of `partial` on every document matching `filters`.
    pub async fn update_all<P>(&self, filters: &[FilterTriple], partial: &P) -> DocumentStoreResult<u64>
    where
        P: Serialize + Sync + ?Sized,
    {
        log::debug!("update_all on collection {}", self.collection);

        self.update_matching(filters, partial).await
    }

    /// Removes every document selected by identifier sets, returning the count.
    pub async fn delete_by_ids(
        &self,
        ids: &Document,
        secondary: Option<&Document>,
    ) -> DocumentStoreResult<u64> {
        log::debug!("delete_by_ids on collection {}", self.collection);

        self.backend
            .delete_many(
                &self.collection,
                filter::compile(&filter::id_set_triples(ids, secondary)),
            )
            .await
    }

    /// Removes every document matching `filters`, returning the count.
    ///
    /// An empty (or entirely falsy) filter list removes the whole collection.
    pub async fn delete_all(&self, filters: &[FilterTriple]) -> DocumentStoreResult<u64> {
        log::debug!("delete_all on collection {}", self.collection);

        self.backend
            .delete_many(&self.collection, filter::compile(filters))
            .await
    }

    /// Returns one more than the largest numeric `id` among matching documents, or
    /// `0` when nothing matches.
    ///
    /// Assumes a densely used numeric `id` field.
    pub async fn get_next_id(&self, filters: &[FilterTriple]) -> DocumentStoreResult<i64> {
        let query = Query {
            filters: filters.to_vec(),
            order_by: Some(OrderBy::desc(SEQUENTIAL_ID_FIELD)),
            rows_range: Some(RowsRange::limit(1)),
        };

        let Some(top) = self.find_documents(&query).await?.into_iter().next() else {
            return Ok(0);
        };

        match top.get(SEQUENTIAL_ID_FIELD) {
            Some(Bson::Int32(id)) => Ok(i64::from(*id) + 1),
            Some(Bson::Int64(id)) => id.checked_add(1).ok_or_else(|| {
                DocumentStoreError::InvalidDocument(format!(
                    "`{SEQUENTIAL_ID_FIELD}` {id} has no successor"
                ))
            }),
            // Integral doubles in [-2^63, 2^63) convert exactly and leave room for +1.
            Some(Bson::Double(id))
                if id.fract() == 0.0 && *id >= i64::MIN as f64 && *id < i64::MAX as f64 =>
            {
                Ok(*id as i64 + 1)
            }
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "expected an integral `{SEQUENTIAL_ID_FIELD}`, found {other:?}"
            ))),
        }
    }

    /// Counts matching documents per distinct value of `count_field`.
    ///
    /// Keys are the stringified group values (`"null"` for documents lacking the
    /// field). Every matching document is counted: the sort and rows range of
    /// `query` do not apply.
    pub async fn group_by_field_filtered(
        &self,
        count_field: &str,
        query: Query,
    ) -> DocumentStoreResult<HashMap<String, u64>> {
        log::debug!("group_by_field_filtered on collection {}", self.collection);

        self.grouped(&query.filters, count_field)
            .await?
            .into_iter()
            .map(|group| {
                let key = stringify(group.get(INTERNAL_ID).unwrap_or(&Bson::Null));
                let count = match group.get("count") {
                    Some(Bson::Int32(n)) => *n as u64,
                    Some(Bson::Int64(n)) => *n as u64,
                    Some(Bson::Double(n)) => *n as u64,
                    other => {
                        return Err(DocumentStoreError::InvalidDocument(format!(
                            "group result without count: {other:?}"
                        )));
                    }
                };

                Ok((key, count))
            })
            .collect()
    }

    /// Releases the shared client. Other accessors sharing it stop working too.
    pub async fn shutdown(&self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }

    async fn update_matching<P>(&self, filters: &[FilterTriple], partial: &P) -> DocumentStoreResult<u64>
    where
        P: Serialize + Sync + ?Sized,
    {
        self.backend
            .update_many(
                &self.collection,
                filter::compile(filters),
                doc! { "$set": to_document(partial)? },
            )
            .await
    }

    async fn find_models(&self, query: &Query) -> DocumentStoreResult<Vec<M>> {
        self.find_documents(query)
            .await?
            .into_iter()
            .map(M::from_document)
            .collect()
    }

    /// Filtered find with the internal identifier projected away.
    async fn find_documents(&self, query: &Query) -> DocumentStoreResult<Vec<Document>> {
        Ok(self
            .backend
            .find(
                &self.collection,
                filter::compile(&query.filters),
                query.find_options(),
            )
            .await?
            .into_iter()
            .map(strip_internal_id)
            .collect())
    }

    /// Filtered aggregation producing `{ _id: <value>, count: <n> }` groups.
    async fn grouped(&self, filters: &[FilterTriple], group_field: &str) -> DocumentStoreResult<Vec<Document>> {
        let pipeline = vec![
            doc! { "$match": filter::compile(filters) },
            doc! {
                "$group": { INTERNAL_ID: format!("${group_field}"), "count": { "$sum": 1 } }
            },
        ];

        self.backend
            .aggregate(&self.collection, pipeline)
            .await
    }
}

impl<M: Model> Clone for DataAccess<M> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            collection: self.collection.clone(),
            _marker: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for DataAccess<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataAccess")
            .field("backend", &self.backend)
            .field("collection", &self.collection)
            .finish()
    }
}

fn first_id(ids: Option<&Document>) -> Option<Bson> {
    ids.and_then(|ids| ids.iter().next())
        .map(|(_, value)| value.clone())
}

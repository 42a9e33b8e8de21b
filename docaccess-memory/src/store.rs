//! In-memory storage implementation for document stores.
//!
//! Documents are kept per collection in insertion order, which is the scan
//! order reads observe when no sort is requested.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use mea::rwlock::RwLock;

use docaccess_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    model::{INTERNAL_ID, stringify},
    query::FindOptions,
};

use crate::{
    evaluator::{Comparable, compare_by, matches},
    pipeline,
};

type StoreMap = HashMap<String, Vec<Document>>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so
/// clones share the same underlying data. Every document receives an `ObjectId`
/// `_id` on insert unless it already carries one, and `_id` values are unique
/// per collection.
///
/// Queries scan all documents of a collection; there are no indexes.
///
/// # Example
///
/// ```ignore
/// use docaccess_memory::InMemoryStore;
/// use docaccess_core::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert_one("users", doc! { "id": 1, "name": "Alice" }).await?;
///
/// let users = store.find("users", doc! { "id": 1 }, Default::default()).await?;
/// assert_eq!(users.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder
    }
}

fn with_internal_id(document: Document) -> Document {
    if document.contains_key(INTERNAL_ID) {
        return document;
    }

    let mut identified = Document::new();
    identified.insert(INTERNAL_ID, ObjectId::new());
    for (key, value) in document {
        identified.insert(key, value);
    }
    identified
}

fn same_id(document: &Document, id: &Bson) -> bool {
    document
        .get(INTERNAL_ID)
        .is_some_and(|existing| Comparable::from(existing) == Comparable::from(id))
}

fn ensure_unique(
    existing: &[Document],
    pending: &[Document],
    document: &Document,
    collection: &str,
) -> DocumentStoreResult<()> {
    let Some(id) = document.get(INTERNAL_ID) else {
        return Ok(());
    };

    if existing.iter().chain(pending).any(|other| same_id(other, id)) {
        return Err(DocumentStoreError::DocumentAlreadyExists(
            stringify(id),
            collection.to_string(),
        ));
    }

    Ok(())
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    let Some((head, rest)) = path.split_once('.') else {
        document.insert(path, value);
        return Ok(());
    };

    if !document.contains_key(head) {
        document.insert(head, Document::new());
    }

    match document.get_mut(head) {
        Some(Bson::Document(inner)) => set_path(inner, rest, value),
        _ => Err(DocumentStoreError::Backend(format!(
            "cannot create field {rest} inside non-document field {head}"
        ))),
    }
}

fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                unset_path(inner, rest);
            }
        }
    }
}

/// Applies a `$set`/`$unset` update document in place.
fn apply_update(document: &mut Document, update: &Document) -> DocumentStoreResult<()> {
    for (operator, fields) in update {
        let fields = fields.as_document().ok_or_else(|| {
            DocumentStoreError::Backend(format!("{operator} needs a document of fields"))
        })?;

        for (path, value) in fields {
            if path == INTERNAL_ID && document.contains_key(INTERNAL_ID) && !same_id(document, value) {
                return Err(DocumentStoreError::Backend(
                    "the _id field is immutable".to_string(),
                ));
            }

            match operator.as_str() {
                "$set" => set_path(document, path, value.clone())?,
                "$unset" => unset_path(document, path),
                other => {
                    return Err(DocumentStoreError::Backend(format!(
                        "unsupported update operator {other}"
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Seeds an upserted document with the equality fields of its filter.
fn upsert_seed(filter: &Document) -> DocumentStoreResult<Document> {
    let mut seed = Document::new();

    for (path, condition) in filter {
        let is_operator = path.starts_with('$')
            || condition
                .as_document()
                .and_then(|d| d.keys().next())
                .is_some_and(|k| k.starts_with('$'));

        if !is_operator {
            set_path(&mut seed, path, condition.clone())?;
        }
    }

    Ok(seed)
}

fn matching<'a>(
    documents: &'a [Document],
    filter: &'a Document,
) -> impl Iterator<Item = DocumentStoreResult<(usize, &'a Document)>> {
    documents
        .iter()
        .enumerate()
        .filter_map(move |(index, document)| match matches(document, filter) {
            Ok(true) => Some(Ok((index, document))),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        })
}

fn matching_indices(documents: &[Document], filter: &Document) -> DocumentStoreResult<Vec<usize>> {
    matching(documents, filter)
        .map(|found| found.map(|(index, _)| index))
        .collect()
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut found = matching(documents, &filter)
            .map(|found| found.map(|(_, document)| document.clone()))
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        if let Some(order_by) = &options.sort {
            let sort = order_by.to_sort_document();
            found.sort_by(|a, b| compare_by(&sort, a, b));
        }

        let skip = options.skip.unwrap_or(0) as usize;
        let limit = match options.limit {
            Some(0) | None => usize::MAX,
            Some(limit) => limit as usize,
        };

        Ok(found.into_iter().skip(skip).take(limit).collect())
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>> {
        let documents = self
            .store
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default();

        pipeline::run(documents, &pipeline)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let documents = store.entry(collection.to_string()).or_default();
        let document = with_internal_id(document);

        ensure_unique(documents, &[], &document, collection)?;
        documents.push(document);

        Ok(())
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let existing = store.entry(collection.to_string()).or_default();

        // The whole batch is validated before any document becomes visible.
        let mut pending = Vec::with_capacity(documents.len());
        for document in documents {
            let document = with_internal_id(document);
            ensure_unique(existing, &pending, &document, collection)?;
            pending.push(document);
        }

        existing.extend(pending);

        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let documents = store.entry(collection.to_string()).or_default();

        let first = matching(documents, &filter)
            .next()
            .transpose()?
            .map(|(index, _)| index);

        match first {
            Some(index) => {
                let mut updated = documents[index].clone();
                apply_update(&mut updated, &update)?;
                documents[index] = updated;
                Ok(1)
            }
            None if upsert => {
                let mut inserted = upsert_seed(&filter)?;
                apply_update(&mut inserted, &update)?;
                let inserted = with_internal_id(inserted);

                ensure_unique(documents, &[], &inserted, collection)?;
                documents.push(inserted);
                Ok(0)
            }
            None => Ok(0),
        }
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        let indices = matching_indices(documents, &filter)?;

        // Apply to copies first so a failing update leaves the collection untouched.
        let mut updated = Vec::with_capacity(indices.len());
        for &index in &indices {
            let mut document = documents[index].clone();
            apply_update(&mut document, &update)?;
            updated.push(document);
        }

        for (index, document) in indices.iter().zip(updated) {
            documents[*index] = document;
        }

        Ok(indices.len() as u64)
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        let indices = matching_indices(documents, &filter)?;
        let mut position = 0;
        documents.retain(|_| {
            let keep = indices.binary_search(&position).is_err();
            position += 1;
            keep
        });

        Ok(indices.len() as u64)
    }

    async fn estimated_document_count(&self, collection: &str) -> DocumentStoreResult<u64> {
        Ok(self
            .store
            .read()
            .await
            .get(collection)
            .map_or(0, |documents| documents.len() as u64))
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// ```ignore
/// use docaccess_memory::InMemoryStore;
/// use docaccess_core::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Always succeeds with a freshly initialized store.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

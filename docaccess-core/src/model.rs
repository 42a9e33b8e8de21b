//! Model traits and document conversion helpers.
//!
//! A model is any serde type. The accessor serializes it into a BSON document for
//! writes and deserializes the projected document for reads. The store-internal
//! `_id` attribute never reaches a model: [`strip_internal_id`] is applied to
//! every document read back from the store.

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Name of the identifier attribute the store maintains on every document.
pub const INTERNAL_ID: &str = "_id";

/// Capability bound for types stored through a [`DataAccess`](crate::access::DataAccess).
///
/// Implemented automatically for every serde type that can cross task boundaries,
/// including `bson::Document` itself for untyped access.
///
/// # Example
///
/// ```ignore
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Order {
///     pub id: i64,
///     pub status: String,
/// }
///
/// // `Order` is a `Model` without any further code.
/// ```
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Model for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Extension trait providing document conversions for models.
pub trait ModelExt: Model {
    /// Converts this model into a BSON document for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the model does not serialize to a map.
    fn to_document(&self) -> DocumentStoreResult<Document>;

    /// Creates a model from a BSON document read from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not match the model's shape.
    fn from_document(document: Document) -> DocumentStoreResult<Self>;
}

impl<M: Model> ModelExt for M {
    fn to_document(&self) -> DocumentStoreResult<Document> {
        to_document(self)
    }

    fn from_document(document: Document) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(document))?)
    }
}

/// Serializes any value that maps onto a document, such as a model or a partial update.
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> DocumentStoreResult<Document> {
    match serialize_to_bson(value)? {
        Bson::Document(document) => Ok(document),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "expected a document, got {:?}",
            other.element_type()
        ))),
    }
}

/// Removes the store-internal identifier from a document read back from the store.
pub fn strip_internal_id(mut document: Document) -> Document {
    document.remove(INTERNAL_ID);
    document
}

/// Renders a BSON value as a plain string key.
///
/// Strings are taken verbatim, numbers in decimal notation, object ids as hex.
/// Used for identifiers copied from model fields and for group-count keys.
pub fn stringify(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        Bson::Int32(i) => i.to_string(),
        Bson::Int64(i) => i.to_string(),
        Bson::Double(f) => f.to_string(),
        Bson::Boolean(b) => b.to_string(),
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::Null | Bson::Undefined => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Product {
        sku: i64,
        name: String,
    }

    #[test]
    fn model_round_trips_through_document() {
        let product = Product { sku: 7, name: "lamp".into() };
        let document = product.to_document().unwrap();

        assert_eq!(document, doc! { "sku": 7_i64, "name": "lamp" });
        assert_eq!(Product::from_document(document).unwrap(), product);
    }

    #[test]
    fn non_map_values_are_rejected() {
        assert!(matches!(
            to_document(&42),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
    }

    #[test]
    fn strip_removes_only_internal_id() {
        let stripped = strip_internal_id(doc! { "_id": ObjectId::new(), "id": 3, "name": "x" });

        assert_eq!(stripped, doc! { "id": 3, "name": "x" });
    }

    #[test]
    fn stringify_matches_plain_rendering() {
        assert_eq!(stringify(&Bson::String("A-1".into())), "A-1");
        assert_eq!(stringify(&Bson::Int32(12)), "12");
        assert_eq!(stringify(&Bson::Int64(-4)), "-4");
        assert_eq!(stringify(&Bson::Double(5.0)), "5");
        assert_eq!(stringify(&Bson::Double(2.5)), "2.5");
        assert_eq!(stringify(&Bson::Null), "null");
    }
}

//! Error types and result types for data-access operations.
//!
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.
//! Store failures surface as [`DocumentStoreError::Backend`]; a single-document
//! read that finds nothing is `Ok(None)`, never an error.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when talking to a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between models and BSON documents.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The connection configuration is incomplete or contradictory.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Error during client construction or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A stored or supplied document does not have the expected shape.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A document with the given `_id` already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// An error occurred in the underlying store or its driver.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for data-access operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

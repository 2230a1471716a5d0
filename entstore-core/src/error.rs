//! Error types and result types for entity store operations.
//!
//! Every fallible operation in this workspace returns [`EntityStoreResult<T>`].
//! A query that matches nothing is not an error: lookups return `Ok(None)`.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with an entity store.
#[derive(Error, Debug)]
pub enum EntityStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The abstract query or its directives could not be translated.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// The document has an invalid structure for the requested operation.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The backend could not open a handle for the collection.
    /// The first argument is the collection name, the second the backend message.
    #[error("Failed to resolve collection {0}: {1}")]
    CollectionResolution(String, String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DuplicateKey(String, String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// The store has been closed.
    #[error("Store is closed")]
    Closed,
}

/// A specialized `Result` type for entity store operations.
pub type EntityStoreResult<T> = Result<T, EntityStoreError>;

impl From<BsonError> for EntityStoreError {
    fn from(err: BsonError) -> Self {
        EntityStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for EntityStoreError {
    fn from(err: SerdeJsonError) -> Self {
        EntityStoreError::Serialization(err.to_string())
    }
}

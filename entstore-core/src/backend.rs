//! Storage backend abstraction for the entity store.
//!
//! A backend is a connected document database client. It hands out
//! [`CollectionHandle`]s by name, and the handles perform the native
//! operations the entity store is composed of.
//!
//! # Traits
//!
//! - [`StoreBackend`]: opens collection handles and exposes the raw client
//! - [`CollectionHandle`]: native CRUD operations on one collection
//! - [`StoreBackendBuilder`]: factory that connects a backend
//!
//! # Examples
//!
//! ```ignore
//! use entstore::backend::{StoreBackend, CollectionHandle};
//! use bson::doc;
//!
//! let users = backend.collection("users").await?;
//! let id = users.insert_one(doc! { "name": "Alice" }).await?;
//! let alice = users.find_one(doc! { "_id": id }, FindSpec::default()).await?;
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream::BoxStream;
use std::fmt::Debug;

use crate::{error::EntityStoreResult, options::FindSpec};

/// Stream of documents produced by [`CollectionHandle::find`].
pub type DocumentCursor = BoxStream<'static, EntityStoreResult<Document>>;

/// Abstract interface for document database clients.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and support concurrent access from
/// multiple async tasks.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Handle to a single collection.
    type Collection: CollectionHandle;
    /// Raw database handle exposed through the native escape hatch.
    type Native: Send;

    /// Opens a handle for the named collection, creating it on first write if needed.
    ///
    /// Handles for the same name are interchangeable.
    async fn collection(&self, name: &str) -> EntityStoreResult<Self::Collection>;

    /// Returns the raw database handle.
    fn native(&self) -> Self::Native;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(&self) -> EntityStoreResult<()> {
        Ok(())
    }
}

/// Native operations on one collection.
#[async_trait]
pub trait CollectionHandle: Clone + Send + Sync + Debug + 'static {
    /// Returns the first document matching `filter` after sorting and skipping.
    ///
    /// The `limit` of `options` is ignored.
    async fn find_one(&self, filter: Document, options: FindSpec) -> EntityStoreResult<Option<Document>>;

    /// Returns a cursor over every document matching `filter`.
    async fn find(&self, filter: Document, options: FindSpec) -> EntityStoreResult<DocumentCursor>;

    /// Inserts a document and returns its `_id`, generated when absent.
    async fn insert_one(&self, document: Document) -> EntityStoreResult<Bson>;

    /// Applies an update document such as `{"$set": {..}}` to the first match.
    ///
    /// With `upsert`, a new document is inserted when nothing matches.
    async fn update_one(&self, filter: Document, update: Document, upsert: bool) -> EntityStoreResult<()>;

    /// Deletes the first match and returns the number of deleted documents.
    async fn delete_one(&self, filter: Document) -> EntityStoreResult<u64>;

    /// Deletes every match and returns the number of deleted documents.
    async fn delete_many(&self, filter: Document) -> EntityStoreResult<u64>;
}

/// Factory that connects a backend.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> EntityStoreResult<Self::Backend>;
}

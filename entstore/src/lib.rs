//! Main entstore crate: an entity store adapter over document databases.
//!
//! Entities are addressed by a namespace and queried with abstract queries,
//! JSON-like documents whose plain fields are equality filters and whose
//! `$`-suffixed keys are directives (`sort$`, `limit$`, `skip$`, `fields$`,
//! `native$`, `all$`, `load$`). The store translates them into native
//! filters and find options and runs them against a backend.
//!
//! # Quick Start
//!
//! ```ignore
//! use entstore::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> EntityStoreResult<()> {
//!     let store = EntityStore::new(InMemoryStore::builder().build().await?);
//!
//!     let template = Record::new(Namespace::new("foo"));
//!     let foo = store.save(template.clone().with_field("p1", "v1")).await?;
//!
//!     // Plain fields filter, directives shape the result
//!     let found = store
//!         .list(&template, &Query::new().eq("p1", "v1").sort("p1", -1).limit(10))
//!         .await?;
//!     assert_eq!(found.len(), 1);
//!
//!     // Native queries bypass translation
//!     let raw = Query::new().native(bson::doc! { "p1": { "$in": ["v1", "v2"] } }, None);
//!     assert!(store.load(&template, &raw).await?.is_some());
//!
//!     store.remove(&template, &Query::by_id(foo.id().unwrap_or_default())).await?;
//!     store.close().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use entstore_core::{backend, config, entity, error, id, mapper, options, query, resolver, store, translate};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend.
pub mod memory {
    pub use entstore_memory::{InMemoryStore, InMemoryStoreBuilder, MemoryCollection};
}

/// MongoDB storage backend.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use entstore_mongodb::{MongoDbCollection, MongoDbConfig, MongoDbStore, MongoDbStoreBuilder};
}

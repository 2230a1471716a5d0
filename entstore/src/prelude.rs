//! Convenient re-exports of commonly used types from entstore.
//!
//! ```ignore
//! use entstore::prelude::*;
//! ```

pub use entstore_core::{
    backend::{CollectionHandle, DocumentCursor, StoreBackend, StoreBackendBuilder},
    config::StoreOptions,
    entity::{Entity, Namespace, Record},
    error::{EntityStoreError, EntityStoreResult},
    query::{Directive, Query},
    store::EntityStore,
};

//! In-memory storage backend for entstore.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `StoreBackend` trait. It uses async-aware read-write locks for concurrent
//! access and is meant for development and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Native filters** - Evaluates the filters the translator emits plus common operators
//! - **Find options** - Sorting, skipping, limiting and projection
//! - **Upserts** - `$set`/`$unset` updates with upsert seeding from the filter
//!
//! # Quick Start
//!
//! ```ignore
//! use entstore::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = EntityStore::new(InMemoryStore::builder().build().await?);
//!
//!     let foo = Record::new(Namespace::new("foo")).with_field("p1", "v1");
//!     let foo = store.save(foo).await?;
//!
//!     let loaded = store.load(&foo, &Query::by_id(foo.id().unwrap())).await?;
//!     assert!(loaded.is_some());
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as entstore_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder, MemoryCollection};

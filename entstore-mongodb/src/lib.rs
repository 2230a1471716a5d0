//! MongoDB backend implementation for entstore.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//! Entity stores built on it read and write the collections of a single database.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! entstore = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! The builder takes a MongoDB connection string. The database comes from the
//! builder, then from the connection string, then falls back to `test`. The
//! server is pinged while building unless `ping_on_connect` is disabled.
//!
//! # Example
//!
//! ```ignore
//! use entstore::{prelude::*, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MongoDbStore::builder("mongodb://localhost:27017/entities")
//!         .app_name("my-service")
//!         .build()
//!         .await?;
//!
//!     let store = EntityStore::new(backend);
//!     let db = store.native().await?;
//!     println!("{}", db.name());
//!
//!     store.close().await;
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as entstore_mongodb;

pub mod config;
pub mod store;

pub use config::MongoDbConfig;
pub use store::{MongoDbCollection, MongoDbStore, MongoDbStoreBuilder};

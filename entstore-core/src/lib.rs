//! Core of the entstore project: an entity store adapter over document databases.
//!
//! This crate provides:
//!
//! - **Identifier codec** ([`id`]) - Entity string ids to native `ObjectId`s and back
//! - **Abstract queries** ([`query`]) - Field filters plus `$`-suffixed directives
//! - **Query translation** ([`translate`]) - Abstract queries to native filter and option documents
//! - **Find options** ([`options`]) - Backend-neutral parsing of option documents
//! - **Entities** ([`entity`]) - The capability trait entities implement, and a schemaless [`entity::Record`]
//! - **Entity mapping** ([`mapper`]) - Entities to persistable documents and back
//! - **Backend abstraction** ([`backend`]) - Traits for document database clients
//! - **Collection resolution** ([`resolver`]) - Namespace to collection handles, cached
//! - **Entity store** ([`store`]) - save, load, list, remove and the native escape hatch
//! - **Configuration** ([`config`]) and **errors** ([`error`])
//!
//! # Example
//!
//! ```ignore
//! use entstore::{prelude::*, memory::InMemoryStore};
//!
//! let store = EntityStore::new(InMemoryStore::new());
//! let foo = store.save(Record::new(Namespace::new("foo")).with_field("p1", "v1")).await?;
//! let all = store.list(&foo, &Query::new().eq("p1", "v1")).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as entstore_core;

pub mod backend;
pub mod config;
pub mod entity;
pub mod error;
pub mod id;
pub mod mapper;
pub mod options;
pub mod query;
pub mod resolver;
pub mod store;
pub mod translate;

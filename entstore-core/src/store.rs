//! Entity store operations.
//!
//! [`EntityStore`] composes the query translator, the entity mapper and the
//! collection resolver over a [`StoreBackend`]. Each operation issues its
//! backend requests sequentially and returns exactly once; failures are
//! logged with the operation context and returned unchanged, never retried.
//!
//! # Example
//!
//! ```ignore
//! use entstore::prelude::*;
//! use entstore::memory::InMemoryStore;
//!
//! let store = EntityStore::new(InMemoryStore::new());
//!
//! let foo = Record::new(Namespace::new("foo")).with_field("p1", "v1");
//! let foo = store.save(foo).await?;
//!
//! let loaded = store.load(&foo, &Query::by_id(foo.id().unwrap())).await?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use bson::{Document, doc};
use futures::TryStreamExt;
use tracing::{debug, error};

use crate::{
    backend::{CollectionHandle, StoreBackend},
    config::StoreOptions,
    entity::{Entity, Namespace},
    error::{EntityStoreError, EntityStoreResult},
    id::{ENTITY_ID_FIELD, NATIVE_ID_FIELD, decode_id},
    mapper::EntityMapper,
    options::FindSpec,
    query::{Directive, Query, is_truthy},
    resolver::{CollectionResolver, collection_name},
    translate::QueryTranslator,
};

/// Name the store registers under.
pub const STORE_NAME: &str = "mongo-store-legacy";

/// Collection probed by [`EntityStore::native`] before handing out the raw handle.
pub const PROBE_COLLECTION: &str = "entstore";

/// Persists and queries entities through a storage backend.
///
/// The store owns its collection cache. It is `Send + Sync` whenever the
/// backend is, and is meant to be shared for the lifetime of the process.
#[derive(Debug)]
pub struct EntityStore<B: StoreBackend> {
    backend: B,
    resolver: CollectionResolver<B::Collection>,
    options: StoreOptions,
    closed: AtomicBool,
}

impl<B: StoreBackend> EntityStore<B> {
    /// Creates a store over a connected backend.
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, StoreOptions::default())
    }

    pub fn with_options(backend: B, options: StoreOptions) -> Self {
        Self {
            backend,
            resolver: CollectionResolver::new(),
            options,
            closed: AtomicBool::new(false),
        }
    }

    /// The fixed name the store registers under.
    pub fn name(&self) -> &'static str {
        STORE_NAME
    }

    /// Store name qualified by its tag, as used in log output.
    pub fn description(&self) -> String {
        match &self.options.tag {
            Some(tag) => format!("{STORE_NAME}~{tag}"),
            None => STORE_NAME.to_string(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Inserts a new entity or updates a persisted one.
    ///
    /// An entity with a non-empty id is written with a `$set` upsert, so fields removed
    /// from it in memory stay in storage, and it is returned unchanged. An
    /// entity without an id is inserted (honoring its desired id) and returned
    /// with the stored id assigned.
    pub async fn save<E: Entity>(&self, mut entity: E) -> EntityStoreResult<E> {
        let collection_name = collection_name(entity.namespace());
        let id = entity.id().filter(|id| !id.is_empty()).map(str::to_owned);

        match id {
            Some(id) => {
                self.run("save/update", &collection_name, async {
                    let collection = self.resolve(entity.namespace()).await?;

                    let mut payload = EntityMapper::to_document(&entity);
                    payload.remove(NATIVE_ID_FIELD);
                    payload.remove(ENTITY_ID_FIELD);

                    collection
                        .update_one(QueryTranslator::id_filter(&id), doc! { "$set": payload }, true)
                        .await?;

                    debug!(store = %self.description(), collection = %collection_name, id = %id, "save/update");
                    Ok(())
                })
                .await?;
            }
            None => {
                let inserted = self
                    .run("save/insert", &collection_name, async {
                        let collection = self.resolve(entity.namespace()).await?;
                        collection.insert_one(EntityMapper::to_document(&entity)).await
                    })
                    .await?;

                entity.set_id(decode_id(&inserted));
                debug!(store = %self.description(), collection = %collection_name, id = ?entity.id(), "save/insert");
            }
        }

        Ok(entity)
    }

    /// Loads the best match for `query`, or `None` when nothing matches.
    pub async fn load<E: Entity>(&self, template: &E, query: &Query) -> EntityStoreResult<Option<E>> {
        let collection_name = collection_name(template.namespace());

        self.run("load", &collection_name, async {
            let collection = self.resolve(template.namespace()).await?;
            let (filter, options) = translate(query)?;

            let entity = EntityMapper::from_document(template, collection.find_one(filter, options).await?);

            debug!(store = %self.description(), collection = %collection_name, found = entity.is_some(), "load");
            Ok(entity)
        })
        .await
    }

    /// Lists every match for `query` in the order the backend yields them.
    pub async fn list<E: Entity>(&self, template: &E, query: &Query) -> EntityStoreResult<Vec<E>> {
        let collection_name = collection_name(template.namespace());

        self.run("list", &collection_name, async {
            let collection = self.resolve(template.namespace()).await?;
            let (filter, options) = translate(query)?;

            let entities = collection
                .find(filter, options)
                .await?
                .try_collect::<Vec<Document>>()
                .await?
                .into_iter()
                .filter_map(|document| EntityMapper::from_document(template, Some(document)))
                .collect::<Vec<E>>();

            debug!(store = %self.description(), collection = %collection_name, count = entities.len(), "list");
            Ok(entities)
        })
        .await
    }

    /// Removes matches for `query`.
    ///
    /// With `all$`, every match is deleted and `None` returned. Otherwise the
    /// best match is deleted by its `_id` and returned when `load$` is unset
    /// or truthy. The find and the delete are separate requests; a concurrent
    /// writer may change the document in between.
    pub async fn remove<E: Entity>(&self, template: &E, query: &Query) -> EntityStoreResult<Option<E>> {
        let collection_name = collection_name(template.namespace());
        let all = query.active_directive(Directive::All).is_some();
        let load = query.get_directive(Directive::Load).is_none_or(is_truthy);

        self.run("remove", &collection_name, async {
            let collection = self.resolve(template.namespace()).await?;

            if all {
                let deleted = collection.delete_many(QueryTranslator::filter(query)?).await?;
                debug!(store = %self.description(), collection = %collection_name, deleted, "remove/all");
                return Ok(None);
            }

            let (filter, mut options) = translate(query)?;
            if let Some(projection) = options.projection.as_mut() {
                projection.remove(NATIVE_ID_FIELD);
            }

            let Some(document) = collection.find_one(filter, options).await? else {
                debug!(store = %self.description(), collection = %collection_name, deleted = 0, "remove/one");
                return Ok(None);
            };

            let native_id = document.get(NATIVE_ID_FIELD).cloned().ok_or_else(|| {
                EntityStoreError::InvalidDocument(format!("Matched document in {collection_name} has no {NATIVE_ID_FIELD}"))
            })?;

            let deleted = collection.delete_one(doc! { NATIVE_ID_FIELD: native_id }).await?;
            debug!(store = %self.description(), collection = %collection_name, deleted, "remove/one");

            Ok(load.then(|| EntityMapper::from_document(template, Some(document))).flatten())
        })
        .await
    }

    /// Returns the raw backend handle after probing the backend with a no-op read.
    pub async fn native(&self) -> EntityStoreResult<B::Native> {
        self.run("native", PROBE_COLLECTION, async {
            self.backend
                .collection(PROBE_COLLECTION)
                .await?
                .find_one(Document::new(), FindSpec::default())
                .await?;

            Ok(self.backend.native())
        })
        .await
    }

    /// Drops the collection cache and shuts the backend down.
    ///
    /// Closing an already closed store succeeds without touching the backend.
    pub async fn close(&self) -> EntityStoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.resolver.clear().await;
        self.backend.shutdown().await.map_err(|err| {
            error!(store = %self.description(), operation = "close", error = %err, "entity store operation failed");
            err
        })?;

        debug!(store = %self.description(), "close");
        Ok(())
    }

    async fn resolve(&self, namespace: &Namespace) -> EntityStoreResult<B::Collection> {
        self.resolver.resolve(&self.backend, namespace).await
    }

    async fn run<T>(
        &self,
        operation: &'static str,
        collection: &str,
        work: impl Future<Output = EntityStoreResult<T>>,
    ) -> EntityStoreResult<T> {
        let result = if self.is_closed() {
            Err(EntityStoreError::Closed)
        } else {
            work.await
        };

        result.map_err(|err| {
            error!(
                store = %self.description(),
                operation,
                collection,
                error = %err,
                "entity store operation failed"
            );
            err
        })
    }
}

fn translate(query: &Query) -> EntityStoreResult<(Document, FindSpec)> {
    let filter = QueryTranslator::filter(query)?;
    let options = FindSpec::from_options(&QueryTranslator::options(query)?)?;

    Ok((filter, options))
}

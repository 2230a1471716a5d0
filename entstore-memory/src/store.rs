//! In-memory storage implementation for entity stores.
//!
//! Collections are insertion-ordered vectors of BSON documents behind
//! async-aware read-write locks.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;

use entstore_core::{
    backend::{CollectionHandle, DocumentCursor, StoreBackend, StoreBackendBuilder},
    error::{EntityStoreError, EntityStoreResult},
    id::{NATIVE_ID_FIELD, decode_id},
    options::FindSpec,
    query::is_truthy,
};

use crate::evaluator::{Comparable, DocumentEvaluator, lookup};

type CollectionMap = HashMap<String, MemoryCollection>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state.
/// Multiple clones of the same instance share the same underlying data,
/// which also makes a clone the raw handle returned by the native escape hatch.
///
/// # Performance
///
/// Queries scan every document in a collection (no indexing).
///
/// # Example
///
/// ```ignore
/// use entstore_memory::InMemoryStore;
/// use entstore::backend::{StoreBackend, CollectionHandle};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let users = store.collection("users").await?;
/// let id = users.insert_one(doc! { "name": "Alice" }).await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    collections: Arc<RwLock<CollectionMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self { collections: Arc::new(RwLock::new(CollectionMap::new())) }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder
    }

    /// Names of every collection opened so far.
    pub async fn collection_names(&self) -> Vec<String> {
        let mut names = self.collections.read().await.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    type Collection = MemoryCollection;
    type Native = InMemoryStore;

    async fn collection(&self, name: &str) -> EntityStoreResult<MemoryCollection> {
        Ok(self
            .collections
            .write()
            .await
            .entry(name.to_string())
            .or_insert_with(|| MemoryCollection::new(name))
            .clone())
    }

    fn native(&self) -> InMemoryStore {
        self.clone()
    }
}

/// Handle to one in-memory collection.
#[derive(Clone, Debug)]
pub struct MemoryCollection {
    name: String,
    documents: Arc<RwLock<Vec<Document>>>,
}

impl MemoryCollection {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            documents: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    async fn select(&self, filter: &Document, options: &FindSpec, limit: Option<usize>) -> EntityStoreResult<Vec<Document>> {
        let documents = self.documents.read().await;

        let mut selected = Vec::new();
        for document in documents.iter() {
            if DocumentEvaluator::new(document).matches(filter)? {
                selected.push(document);
            }
        }

        if let Some(sort) = &options.sort {
            selected.sort_by(|a, b| compare_by(a, b, sort));
        }

        Ok(selected
            .into_iter()
            .skip(options.skip.unwrap_or(0) as usize)
            .take(limit.unwrap_or(usize::MAX))
            .map(|document| project(document, options.projection.as_ref()))
            .collect())
    }

    fn ensure_unique(documents: &[Document], id: &Bson, collection: &str) -> EntityStoreResult<()> {
        if documents.iter().any(|existing| existing.get(NATIVE_ID_FIELD) == Some(id)) {
            return Err(EntityStoreError::DuplicateKey(decode_id(id), collection.to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl CollectionHandle for MemoryCollection {
    async fn find_one(&self, filter: Document, options: FindSpec) -> EntityStoreResult<Option<Document>> {
        Ok(self.select(&filter, &options, Some(1)).await?.into_iter().next())
    }

    async fn find(&self, filter: Document, options: FindSpec) -> EntityStoreResult<DocumentCursor> {
        let limit = options.limit.map(|limit| limit.unsigned_abs() as usize);
        let documents = self.select(&filter, &options, limit).await?;

        Ok(stream::iter(documents.into_iter().map(Ok)).boxed())
    }

    async fn insert_one(&self, mut document: Document) -> EntityStoreResult<Bson> {
        let mut documents = self.documents.write().await;

        let id = match document.get(NATIVE_ID_FIELD) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert(NATIVE_ID_FIELD, id.clone());
                id
            }
        };

        Self::ensure_unique(&documents, &id, &self.name)?;
        documents.push(document);

        Ok(id)
    }

    async fn update_one(&self, filter: Document, update: Document, upsert: bool) -> EntityStoreResult<()> {
        let mut documents = self.documents.write().await;

        let mut position = None;
        for (index, document) in documents.iter().enumerate() {
            if DocumentEvaluator::new(document).matches(&filter)? {
                position = Some(index);
                break;
            }
        }

        match position {
            Some(index) => apply_update(&mut documents[index], &update),
            None if upsert => {
                let mut document = upsert_seed(&filter);
                apply_update(&mut document, &update)?;

                let id = match document.get(NATIVE_ID_FIELD) {
                    Some(id) => id.clone(),
                    None => {
                        let id = Bson::ObjectId(ObjectId::new());
                        document.insert(NATIVE_ID_FIELD, id.clone());
                        id
                    }
                };

                Self::ensure_unique(&documents, &id, &self.name)?;
                documents.push(document);
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn delete_one(&self, filter: Document) -> EntityStoreResult<u64> {
        let mut documents = self.documents.write().await;

        for index in 0..documents.len() {
            if DocumentEvaluator::new(&documents[index]).matches(&filter)? {
                documents.remove(index);
                return Ok(1);
            }
        }

        Ok(0)
    }

    async fn delete_many(&self, filter: Document) -> EntityStoreResult<u64> {
        let mut documents = self.documents.write().await;

        let matched = documents
            .iter()
            .map(|document| DocumentEvaluator::new(document).matches(&filter))
            .collect::<EntityStoreResult<Vec<bool>>>()?;

        let deleted = matched.iter().filter(|m| **m).count() as u64;

        let mut matched = matched.into_iter();
        documents.retain(|_| !matched.next().unwrap_or(false));

        Ok(deleted)
    }
}

fn compare_by(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, direction) in sort {
        let left = lookup(a, field).map(Comparable::from).unwrap_or(Comparable::Null);
        let right = lookup(b, field).map(Comparable::from).unwrap_or(Comparable::Null);

        let ordering = match direction.as_i32() {
            Some(direction) if direction < 0 => right.sort_cmp(&left),
            _ => left.sort_cmp(&right),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

fn project(document: &Document, projection: Option<&Document>) -> Document {
    let Some(projection) = projection else {
        return document.clone();
    };

    let inclusive = projection
        .iter()
        .any(|(field, flag)| field != NATIVE_ID_FIELD && is_truthy(flag));
    let keep_id = projection.get(NATIVE_ID_FIELD).is_none_or(is_truthy);

    document
        .iter()
        .filter(|(field, _)| {
            if field.as_str() == NATIVE_ID_FIELD {
                return keep_id;
            }
            match projection.get(field.as_str()) {
                Some(flag) => is_truthy(flag) == inclusive,
                None => !inclusive,
            }
        })
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}

// Equality fields of the filter become the fields of an upserted document.
fn upsert_seed(filter: &Document) -> Document {
    filter
        .iter()
        .filter(|(field, value)| !field.starts_with('$') && !field.contains('.') && !is_operator(value))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}

fn is_operator(value: &Bson) -> bool {
    value
        .as_document()
        .and_then(|doc| doc.keys().next())
        .is_some_and(|key| key.starts_with('$'))
}

fn apply_update(document: &mut Document, update: &Document) -> EntityStoreResult<()> {
    for (op, fields) in update {
        let fields = fields
            .as_document()
            .ok_or_else(|| EntityStoreError::InvalidDocument(format!("{op} requires a document")))?;

        match op.as_str() {
            "$set" => {
                for (field, value) in fields {
                    if field == NATIVE_ID_FIELD && document.get(NATIVE_ID_FIELD).is_some_and(|id| id != value) {
                        return Err(EntityStoreError::InvalidDocument(format!("{NATIVE_ID_FIELD} is immutable")));
                    }
                    document.insert(field.clone(), value.clone());
                }
            }
            "$unset" => {
                for (field, _) in fields {
                    document.remove(field);
                }
            }
            other => {
                return Err(EntityStoreError::InvalidDocument(format!("Unsupported update operator {other}")));
            }
        }
    }

    Ok(())
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> EntityStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use futures::TryStreamExt;

    use super::*;

    async fn seeded() -> MemoryCollection {
        let collection = InMemoryStore::new().collection("lmt").await.unwrap();
        for (p1, n) in [("b", 2), ("a", 1), ("c", 3)] {
            collection.insert_one(doc! { "p1": p1, "n": n }).await.unwrap();
        }
        collection
    }

    async fn find(collection: &MemoryCollection, filter: Document, options: FindSpec) -> Vec<Document> {
        collection.find(filter, options).await.unwrap().try_collect().await.unwrap()
    }

    #[tokio::test]
    async fn handles_share_state() {
        let store = InMemoryStore::new();
        let first = store.collection("foo").await.unwrap();
        let second = store.native().collection("foo").await.unwrap();

        first.insert_one(doc! { "a": 1 }).await.unwrap();

        assert_eq!(second.len().await, 1);
        assert_eq!(store.collection_names().await, vec!["foo".to_string()]);
    }

    #[tokio::test]
    async fn insert_generates_and_keeps_ids() {
        let collection = InMemoryStore::new().collection("foo").await.unwrap();

        assert!(matches!(collection.insert_one(doc! {}).await.unwrap(), Bson::ObjectId(_)));
        assert_eq!(collection.insert_one(doc! { "_id": "zxy" }).await.unwrap(), Bson::String("zxy".into()));
        assert!(matches!(
            collection.insert_one(doc! { "_id": "zxy" }).await,
            Err(EntityStoreError::DuplicateKey(id, _)) if id == "zxy"
        ));
    }

    #[tokio::test]
    async fn find_sorts_skips_and_limits() {
        let collection = seeded().await;

        let sorted = find(&collection, doc! {}, FindSpec { sort: Some(doc! { "n": -1 }), ..Default::default() }).await;
        let names = sorted.iter().map(|d| d.get_str("p1").unwrap()).collect::<Vec<_>>();
        assert_eq!(names, vec!["c", "b", "a"]);

        let page = find(
            &collection,
            doc! {},
            FindSpec { sort: Some(doc! { "n": 1 }), skip: Some(1), limit: Some(1), ..Default::default() },
        )
        .await;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].get_str("p1").unwrap(), "b");

        let past_end = find(&collection, doc! {}, FindSpec { skip: Some(3), limit: Some(2), ..Default::default() }).await;
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn find_one_honors_sort() {
        let collection = seeded().await;

        let first = collection
            .find_one(doc! {}, FindSpec { sort: Some(doc! { "p1": 1 }), ..Default::default() })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.get_str("p1").unwrap(), "a");
    }

    #[tokio::test]
    async fn projection_includes_or_excludes() {
        let collection = seeded().await;

        let included = find(&collection, doc! { "n": 1 }, FindSpec { projection: Some(doc! { "p1": 1 }), ..Default::default() }).await;
        assert_eq!(included[0].keys().cloned().collect::<Vec<_>>(), vec!["p1".to_string(), "_id".to_string()]);

        let excluded = find(&collection, doc! { "n": 1 }, FindSpec { projection: Some(doc! { "p1": 0, "_id": 0 }), ..Default::default() }).await;
        assert_eq!(excluded[0], doc! { "n": 1 });
    }

    #[tokio::test]
    async fn update_sets_fields_and_upserts() {
        let collection = seeded().await;

        collection.update_one(doc! { "p1": "a" }, doc! { "$set": { "n": 10 } }, false).await.unwrap();
        assert_eq!(find(&collection, doc! { "n": 10 }, FindSpec::default()).await.len(), 1);

        collection.update_one(doc! { "p1": "z" }, doc! { "$set": { "n": 11 } }, false).await.unwrap();
        assert_eq!(collection.len().await, 3);

        collection.update_one(doc! { "_id": "custom" }, doc! { "$set": { "n": 12 } }, true).await.unwrap();
        let upserted = collection.find_one(doc! { "_id": "custom" }, FindSpec::default()).await.unwrap().unwrap();
        assert_eq!(upserted.get_i32("n").unwrap(), 12);

        collection.update_one(doc! { "_id": "custom" }, doc! { "$unset": { "n": "" } }, false).await.unwrap();
        let unset = collection.find_one(doc! { "_id": "custom" }, FindSpec::default()).await.unwrap().unwrap();
        assert_eq!(unset, doc! { "_id": "custom" });
    }

    #[tokio::test]
    async fn deletes_one_or_many() {
        let collection = seeded().await;

        assert_eq!(collection.delete_one(doc! { "n": { "$gt": 1 } }).await.unwrap(), 1);
        assert_eq!(collection.len().await, 2);

        assert_eq!(collection.delete_many(doc! {}).await.unwrap(), 2);
        assert!(collection.is_empty().await);
        assert_eq!(collection.delete_one(doc! {}).await.unwrap(), 0);
    }
}

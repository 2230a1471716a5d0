//! Namespace to collection resolution with a handle cache.

use std::{collections::HashMap, sync::Arc};

use mea::{mutex::Mutex, rwlock::RwLock};
use tracing::debug;

use crate::{
    backend::StoreBackend,
    entity::Namespace,
    error::{EntityStoreError, EntityStoreResult},
};

type Slot<C> = Arc<Mutex<Option<C>>>;

/// Physical collection name for a namespace: `base_name`, or `name` without a base.
pub fn collection_name(namespace: &Namespace) -> String {
    match namespace.base.as_deref() {
        Some(base) if !base.is_empty() => format!("{}_{}", base, namespace.name),
        _ => namespace.name.clone(),
    }
}

/// Resolves namespaces to collection handles, opening each collection once.
///
/// Every collection name gets its own slot. Callers resolving the same name
/// wait for a single open, while other names stay available. Handles are
/// cached for the lifetime of the resolver and only dropped by
/// [`CollectionResolver::clear`].
#[derive(Debug)]
pub struct CollectionResolver<C> {
    slots: RwLock<HashMap<String, Slot<C>>>,
}

impl<C: Clone> CollectionResolver<C> {
    pub fn new() -> Self {
        Self { slots: RwLock::new(HashMap::new()) }
    }

    /// Returns the handle for `namespace`, asking `backend` to open it on a cache miss.
    ///
    /// # Errors
    ///
    /// Returns [`EntityStoreError::CollectionResolution`] when the backend fails to open the collection.
    pub async fn resolve<B>(&self, backend: &B, namespace: &Namespace) -> EntityStoreResult<C>
    where
        B: StoreBackend<Collection = C>,
    {
        let name = collection_name(namespace);
        let slot = self.slot(&name).await;
        let mut cached = slot.lock().await;

        if let Some(handle) = cached.as_ref() {
            return Ok(handle.clone());
        }

        let handle = backend
            .collection(&name)
            .await
            .map_err(|e| EntityStoreError::CollectionResolution(name.clone(), e.to_string()))?;

        debug!(collection = %name, "collection opened");
        *cached = Some(handle.clone());

        Ok(handle)
    }

    async fn slot(&self, name: &str) -> Slot<C> {
        if let Some(slot) = self.slots.read().await.get(name) {
            return slot.clone();
        }

        self.slots
            .write()
            .await
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Number of cached handles.
    pub async fn len(&self) -> usize {
        let slots = self.slots.read().await.values().cloned().collect::<Vec<_>>();

        let mut len = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                len += 1;
            }
        }

        len
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every cached handle.
    pub async fn clear(&self) {
        self.slots.write().await.clear();
    }
}

impl<C: Clone> Default for CollectionResolver<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use bson::{Bson, Document};
    use futures::{StreamExt, stream};

    use super::*;
    use crate::{
        backend::{CollectionHandle, DocumentCursor},
        options::FindSpec,
    };

    #[derive(Debug, Clone)]
    struct NamedHandle(String);

    #[async_trait]
    impl CollectionHandle for NamedHandle {
        async fn find_one(&self, _: Document, _: FindSpec) -> EntityStoreResult<Option<Document>> {
            Ok(None)
        }

        async fn find(&self, _: Document, _: FindSpec) -> EntityStoreResult<DocumentCursor> {
            Ok(stream::empty().boxed())
        }

        async fn insert_one(&self, _: Document) -> EntityStoreResult<Bson> {
            Ok(Bson::Null)
        }

        async fn update_one(&self, _: Document, _: Document, _: bool) -> EntityStoreResult<()> {
            Ok(())
        }

        async fn delete_one(&self, _: Document) -> EntityStoreResult<u64> {
            Ok(0)
        }

        async fn delete_many(&self, _: Document) -> EntityStoreResult<u64> {
            Ok(0)
        }
    }

    #[derive(Debug, Default)]
    struct CountingBackend {
        opened: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl StoreBackend for CountingBackend {
        type Collection = NamedHandle;
        type Native = ();

        async fn collection(&self, name: &str) -> EntityStoreResult<NamedHandle> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EntityStoreError::Backend("unreachable".to_string()));
            }
            Ok(NamedHandle(name.to_string()))
        }

        fn native(&self) -> Self::Native {}
    }

    #[derive(Debug)]
    struct GatedBackend {
        gate: mea::latch::Latch,
    }

    #[async_trait]
    impl StoreBackend for GatedBackend {
        type Collection = NamedHandle;
        type Native = ();

        async fn collection(&self, name: &str) -> EntityStoreResult<NamedHandle> {
            if name == "slow" {
                self.gate.wait().await;
            }
            Ok(NamedHandle(name.to_string()))
        }

        fn native(&self) -> Self::Native {}
    }

    #[test]
    fn collection_names() {
        assert_eq!(collection_name(&Namespace::new("foo")), "foo");
        assert_eq!(collection_name(&Namespace::new("bar").with_base("moon").with_zone("zen")), "moon_bar");
        assert_eq!(collection_name(&Namespace::new("bar").with_base("")), "bar");
        assert_eq!(collection_name(&Namespace::new("bar").with_zone("zen")), "bar");
    }

    #[tokio::test]
    async fn resolves_each_collection_once() {
        let backend = CountingBackend::default();
        let resolver = CollectionResolver::<NamedHandle>::new();

        let first = resolver.resolve(&backend, &Namespace::new("foo")).await.unwrap();
        let second = resolver.resolve(&backend, &Namespace::new("foo")).await.unwrap();
        let other = resolver.resolve(&backend, &Namespace::new("bar").with_base("moon")).await.unwrap();

        assert_eq!(first.0, "foo");
        assert_eq!(second.0, "foo");
        assert_eq!(other.0, "moon_bar");
        assert_eq!(backend.opened.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.len().await, 2);
    }

    #[tokio::test]
    async fn concurrent_first_access_opens_once() {
        let backend = Arc::new(CountingBackend::default());
        let resolver = Arc::new(CollectionResolver::<NamedHandle>::new());

        let tasks = (0..8)
            .map(|_| {
                let backend = backend.clone();
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve(backend.as_ref(), &Namespace::new("foo")).await })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().0, "foo");
        }

        assert_eq!(backend.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let backend = CountingBackend { fail: true, ..Default::default() };
        let resolver = CollectionResolver::<NamedHandle>::new();

        let err = resolver.resolve(&backend, &Namespace::new("foo")).await.unwrap_err();

        assert!(matches!(err, EntityStoreError::CollectionResolution(ref name, _) if name == "foo"));
        assert!(resolver.is_empty().await);

        resolver.clear().await;
        assert!(resolver.resolve(&backend, &Namespace::new("foo")).await.is_err());
        assert_eq!(backend.opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_open_does_not_block_other_collections() {
        let backend = Arc::new(GatedBackend { gate: mea::latch::Latch::new(1) });
        let resolver = Arc::new(CollectionResolver::<NamedHandle>::new());

        resolver.resolve(backend.as_ref(), &Namespace::new("foo")).await.unwrap();

        let slow = {
            let backend = backend.clone();
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve(backend.as_ref(), &Namespace::new("slow")).await })
        };
        tokio::task::yield_now().await;

        assert_eq!(resolver.resolve(backend.as_ref(), &Namespace::new("foo")).await.unwrap().0, "foo");
        assert_eq!(resolver.resolve(backend.as_ref(), &Namespace::new("bar")).await.unwrap().0, "bar");
        assert!(!slow.is_finished());

        backend.gate.count_down();
        assert_eq!(slow.await.unwrap().unwrap().0, "slow");
        assert_eq!(resolver.len().await, 3);
    }
}

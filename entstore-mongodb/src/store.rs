use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, Collection as MongoCollection, Database,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOneOptions, FindOptions},
};
use tracing::debug;

use entstore_core::{
    backend::{CollectionHandle, DocumentCursor, StoreBackend, StoreBackendBuilder},
    error::{EntityStoreError, EntityStoreResult},
    id::{NATIVE_ID_FIELD, decode_id},
    options::FindSpec,
};

use crate::config::{DEFAULT_DATABASE, MongoDbConfig};

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: Database,
}

impl MongoDbStore {
    pub fn new(client: Client, database: Database) -> Self {
        Self { client, database }
    }

    pub fn builder(url: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(url)
    }

    pub fn database(&self) -> &Database {
        &self.database
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    type Collection = MongoDbCollection;
    type Native = Database;

    async fn collection(&self, name: &str) -> EntityStoreResult<MongoDbCollection> {
        Ok(MongoDbCollection {
            inner: self.database.collection::<Document>(name),
        })
    }

    fn native(&self) -> Database {
        self.database.clone()
    }

    async fn shutdown(&self) -> EntityStoreResult<()> {
        self.client.clone().shutdown().await;

        Ok(())
    }
}

/// Handle to one MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoDbCollection {
    inner: MongoCollection<Document>,
}

impl MongoDbCollection {
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    fn map_insert_error(&self, err: MongoError, id: Option<&Bson>) -> EntityStoreError {
        if let ErrorKind::Write(WriteFailure::WriteError(write_error)) = err.kind.as_ref() {
            if write_error.code == DUPLICATE_KEY_CODE {
                return EntityStoreError::DuplicateKey(
                    id.map(decode_id).unwrap_or_default(),
                    self.name().to_string(),
                );
            }
        }

        backend_error(err)
    }
}

#[async_trait]
impl CollectionHandle for MongoDbCollection {
    async fn find_one(&self, filter: Document, options: FindSpec) -> EntityStoreResult<Option<Document>> {
        let mut find_options = FindOneOptions::default();
        find_options.sort = options.sort;
        find_options.skip = options.skip;
        find_options.projection = options.projection;

        self.inner
            .find_one(filter)
            .with_options(find_options)
            .await
            .map_err(backend_error)
    }

    async fn find(&self, filter: Document, options: FindSpec) -> EntityStoreResult<DocumentCursor> {
        let mut find_options = FindOptions::default();
        find_options.sort = options.sort;
        find_options.limit = options.limit;
        find_options.skip = options.skip;
        find_options.projection = options.projection;

        Ok(self
            .inner
            .find(filter)
            .with_options(find_options)
            .await
            .map_err(backend_error)?
            .map_err(backend_error)
            .boxed())
    }

    async fn insert_one(&self, document: Document) -> EntityStoreResult<Bson> {
        let id = document.get(NATIVE_ID_FIELD).cloned();

        Ok(self
            .inner
            .insert_one(document)
            .await
            .map_err(|e| self.map_insert_error(e, id.as_ref()))?
            .inserted_id)
    }

    async fn update_one(&self, filter: Document, update: Document, upsert: bool) -> EntityStoreResult<()> {
        self.inner
            .update_one(filter, update)
            .upsert(upsert)
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn delete_one(&self, filter: Document) -> EntityStoreResult<u64> {
        Ok(self
            .inner
            .delete_one(filter)
            .await
            .map_err(backend_error)?
            .deleted_count)
    }

    async fn delete_many(&self, filter: Document) -> EntityStoreResult<u64> {
        Ok(self
            .inner
            .delete_many(filter)
            .await
            .map_err(backend_error)?
            .deleted_count)
    }
}

fn backend_error(err: MongoError) -> EntityStoreError {
    EntityStoreError::Backend(err.to_string())
}

pub struct MongoDbStoreBuilder {
    config: MongoDbConfig,
}

impl MongoDbStoreBuilder {
    pub fn new(url: &str) -> Self {
        Self::from_config(MongoDbConfig::new(url))
    }

    pub fn from_config(config: MongoDbConfig) -> Self {
        Self { config }
    }

    pub fn database(mut self, database: &str) -> Self {
        self.config.database = Some(database.to_string());
        self
    }

    pub fn app_name(mut self, app_name: &str) -> Self {
        self.config.app_name = Some(app_name.to_string());
        self
    }

    pub fn ping_on_connect(mut self, ping: bool) -> Self {
        self.config.ping_on_connect = ping;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> EntityStoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.config.url)
            .await
            .map_err(|e| EntityStoreError::Initialization(e.to_string()))?;

        if let Some(app_name) = self.config.app_name {
            options.app_name = Some(app_name);
        }

        let client = Client::with_options(options)
            .map_err(|e| EntityStoreError::Initialization(e.to_string()))?;

        let database = match &self.config.database {
            Some(name) => client.database(name),
            None => client
                .default_database()
                .unwrap_or_else(|| client.database(DEFAULT_DATABASE)),
        };

        if self.config.ping_on_connect {
            database
                .run_command(doc! { "ping": 1 })
                .await
                .map_err(|e| EntityStoreError::Initialization(e.to_string()))?;
        }

        debug!(database = %database.name(), "db open");

        Ok(MongoDbStore::new(client, database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_settings() {
        let builder = MongoDbStore::builder("mongodb://db.internal:27017")
            .database("entities")
            .app_name("entstore")
            .ping_on_connect(false);

        assert_eq!(
            builder.config,
            MongoDbConfig {
                url: "mongodb://db.internal:27017".to_string(),
                database: Some("entities".to_string()),
                app_name: Some("entstore".to_string()),
                ping_on_connect: false,
            }
        );
    }

    #[tokio::test]
    async fn invalid_url_is_an_initialization_error() {
        let result = MongoDbStore::builder("not a url").build().await;

        assert!(matches!(result, Err(EntityStoreError::Initialization(_))));
    }
}

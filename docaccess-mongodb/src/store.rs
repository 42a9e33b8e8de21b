use async_trait::async_trait;
use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as DriverError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions as DriverFindOptions},
};

use docaccess_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    config::{ConnectionTarget, StoreConfig},
    error::{DocumentStoreError, DocumentStoreResult},
    model::{INTERNAL_ID, stringify},
    query::FindOptions,
};

const DUPLICATE_KEY: i32 = 11000;

fn backend_error(e: DriverError) -> DocumentStoreError {
    DocumentStoreError::Backend(e.to_string())
}

/// Translates read options into the driver's form. A zero limit means no limit.
fn driver_find_options(options: &FindOptions) -> DriverFindOptions {
    let mut driver = DriverFindOptions::default();

    driver.sort = options.sort.as_ref().map(|order_by| order_by.to_sort_document());
    driver.skip = options.skip.filter(|skip| *skip > 0);
    driver.limit = options
        .limit
        .filter(|limit| *limit > 0)
        .map(|limit| limit as i64);

    driver
}

/// Document store backed by a MongoDB (or API-compatible) deployment.
///
/// The store is bound to one database; each call resolves its collection handle
/// from the collection name it receives.
#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    /// Name of the database every collection handle is resolved in.
    pub fn database_name(&self) -> &str {
        &self.database
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        self.get_collection(collection)
            .find(filter)
            .with_options(driver_find_options(&options))
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>> {
        self.get_collection(collection)
            .aggregate(pipeline)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<()> {
        let id = document.get(INTERNAL_ID).map(stringify);

        self.get_collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| {
                let duplicate = matches!(
                    e.kind.as_ref(),
                    ErrorKind::Write(WriteFailure::WriteError(failure)) if failure.code == DUPLICATE_KEY
                );

                match id {
                    Some(id) if duplicate => {
                        DocumentStoreError::DocumentAlreadyExists(id, collection.to_string())
                    }
                    _ => backend_error(e),
                }
            })?;

        Ok(())
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> DocumentStoreResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        self.get_collection(collection)
            .insert_many(documents)
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .update_one(filter, update)
            .upsert(upsert)
            .await
            .map_err(backend_error)?
            .matched_count)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .update_many(filter, update)
            .await
            .map_err(backend_error)?
            .matched_count)
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_many(filter)
            .await
            .map_err(backend_error)?
            .deleted_count)
    }

    async fn estimated_document_count(&self, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .estimated_document_count()
            .await
            .map_err(backend_error)
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        self.client.clone().shutdown().await;

        Ok(())
    }
}

/// Connects a [`MongoDbStore`], verifying the deployment answers a `ping`.
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }

    /// Resolves the connection string and database name from application settings.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] when neither an emulator nor a
    /// managed host is configured.
    pub fn from_config(config: &StoreConfig) -> DocumentStoreResult<Self> {
        let (kind, host) = match config.target()? {
            ConnectionTarget::Emulator { host } => ("emulator", host),
            ConnectionTarget::Managed { host } => ("managed cluster", host),
        };
        if config.mongo_configuration.username.is_empty() {
            log::info!("connecting to {kind} {host} without credentials");
        } else {
            log::info!("connecting to {kind} {host}");
        }

        Ok(Self {
            dsn: config.connection_string()?,
            database: config.database_name(),
        })
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let client = Client::with_options(
            ClientOptions::parse(&self.dsn)
                .await
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
        )
        .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;
        log::debug!("connected to database {}", self.database);

        Ok(MongoDbStore::new(client, self.database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docaccess_core::{config::MongoConfiguration, query::OrderBy};

    #[test]
    fn find_options_drop_empty_windows() {
        let options = driver_find_options(&FindOptions {
            sort: Some(OrderBy::desc("id")),
            skip: Some(0),
            limit: Some(0),
        });

        assert_eq!(options.sort, Some(doc! { "id": -1 }));
        assert_eq!(options.skip, None);
        assert_eq!(options.limit, None);
    }

    #[test]
    fn find_options_carry_pagination() {
        let options = driver_find_options(&FindOptions {
            sort: None,
            skip: Some(20),
            limit: Some(10),
        });

        assert_eq!(options.skip, Some(20));
        assert_eq!(options.limit, Some(10));
    }

    #[test]
    fn builder_resolves_settings() {
        let config = StoreConfig {
            env_prefix: "prod".into(),
            mongo_configuration: MongoConfiguration {
                emulator_host: None,
                db_host: Some("cluster0.example.net".into()),
                db_name: "orders".into(),
                username: "svc".into(),
                password: "pw".into(),
            },
        };

        let builder = MongoDbStoreBuilder::from_config(&config).unwrap();

        assert_eq!(builder.database, "prod-orders");
        assert!(builder.dsn.starts_with("mongodb+srv://svc:pw@cluster0.example.net/prod-orders"));
    }

    #[test]
    fn builder_requires_a_host() {
        let config = StoreConfig::default();

        assert!(matches!(
            MongoDbStoreBuilder::from_config(&config),
            Err(DocumentStoreError::Configuration(_))
        ));
    }
}

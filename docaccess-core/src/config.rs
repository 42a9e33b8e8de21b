//! Connection configuration for the store client.
//!
//! Two connection shapes are supported: a local emulator (`emulatorHost`) or a
//! managed cluster (`dbHost`). The emulator wins when both are present. Having
//! neither is a fatal configuration error; there is no implicit localhost
//! fallback.
//!
//! The structs deserialize from the camelCase layout applications already keep
//! in their settings files:
//!
//! ```json
//! {
//!   "envPrefix": "dev",
//!   "mongoConfiguration": {
//!     "dbHost": "cluster0.example.net",
//!     "dbName": "orders",
//!     "username": "svc",
//!     "password": "secret"
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Host and credential settings for the document store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoConfiguration {
    /// `host[:port]` of a local emulator.
    #[serde(default)]
    pub emulator_host: Option<String>,
    /// Host of a managed (SRV) cluster.
    #[serde(default)]
    pub db_host: Option<String>,
    /// Logical database name, prefixed with the environment at runtime.
    pub db_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Application-level store settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Environment prefix (e.g. `dev`, `prod`) prepended to the database name.
    pub env_prefix: String,
    pub mongo_configuration: MongoConfiguration,
}

/// The connection shape selected from a [`StoreConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget<'a> {
    Emulator { host: &'a str },
    Managed { host: &'a str },
}

impl StoreConfig {
    /// Parses settings from a JSON document.
    pub fn from_json_str(json: &str) -> DocumentStoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolved database name: `"{envPrefix}-{dbName}"`.
    pub fn database_name(&self) -> String {
        format!("{}-{}", self.env_prefix, self.mongo_configuration.db_name)
    }

    /// Selects the connection shape, or fails when no host is configured.
    pub fn target(&self) -> DocumentStoreResult<ConnectionTarget<'_>> {
        fn non_empty(host: &Option<String>) -> Option<&str> {
            host.as_deref().filter(|h| !h.is_empty())
        }

        let mongo = &self.mongo_configuration;

        if let Some(host) = non_empty(&mongo.emulator_host) {
            Ok(ConnectionTarget::Emulator { host })
        } else if let Some(host) = non_empty(&mongo.db_host) {
            Ok(ConnectionTarget::Managed { host })
        } else {
            Err(DocumentStoreError::Configuration("Mongo host is missing".into()))
        }
    }

    /// Builds the driver connection string.
    ///
    /// Credentials are percent-encoded. Managed clusters always connect with
    /// retryable writes and a majority write concern.
    pub fn connection_string(&self) -> DocumentStoreResult<String> {
        let mongo = &self.mongo_configuration;
        let username = urlencoding::encode(&mongo.username);
        let password = urlencoding::encode(&mongo.password);

        Ok(match self.target()? {
            ConnectionTarget::Emulator { host } => {
                format!("mongodb://{username}:{password}@{host}")
            }
            ConnectionTarget::Managed { host } => format!(
                "mongodb+srv://{username}:{password}@{host}/{}?retryWrites=true&w=majority",
                self.database_name(),
            ),
        })
    }
}

//! Connection configuration for the MongoDB backend.

use serde::{Deserialize, Serialize};

/// Database used when neither the configuration nor the URL names one.
pub const DEFAULT_DATABASE: &str = "test";

/// Connection settings for [`MongoDbStoreBuilder`](crate::store::MongoDbStoreBuilder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoDbConfig {
    /// MongoDB connection string.
    pub url: String,
    /// Database name; defaults to the one in the URL, then [`DEFAULT_DATABASE`].
    pub database: Option<String>,
    /// Application name reported to the server.
    pub app_name: Option<String>,
    /// Ping the server while building so connection failures surface at startup.
    pub ping_on_connect: bool,
}

impl Default for MongoDbConfig {
    fn default() -> Self {
        Self {
            url: "mongodb://localhost:27017".to_string(),
            database: None,
            app_name: None,
            ping_on_connect: true,
        }
    }
}

impl MongoDbConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Default::default() }
    }
}

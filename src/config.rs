use async_trait::async_trait;
use slog::Logger;
use std::path::PathBuf;

use crate::backend::{Backend, DocumentStore, EmbeddedStore, KeyValueStore, DEFAULT_BATCH_SIZE};
use crate::error::{Error, Result};
use crate::record::Delimiters;

/// The default MongoDB connection string.
pub const DEFAULT_MONGO_URI: &str = "mongodb://127.0.0.1:27017";

/// The default database name.
pub const DEFAULT_DATABASE: &str = "Test";

/// The default collection name.
pub const DEFAULT_COLLECTION: &str = "Test";

/// The default Redis connection URL.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";

/// The default Redis key pattern.
pub const DEFAULT_PATTERN: &str = "*";

/// The default sled directory.
pub const DEFAULT_SLED_PATH: &str = "dbbench-data";

/// The default input file.
pub const DEFAULT_INPUT: &str = "100-data.tsv";

/// The names accepted by [`BackendConfig::from_name`].
///
/// [`BackendConfig::from_name`]: enum.BackendConfig.html#method.from_name
pub const BACKEND_NAMES: &[&str] = &["mongodb", "redis", "sled"];

/// Everything needed for one benchmark run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// The file records are read from.
    pub input: PathBuf,

    /// How the input file is split into rows and fields.
    pub delimiters: Delimiters,

    /// The backend to benchmark.
    pub backend: BackendConfig,
}

impl Config {
    /// A run reading tab-separated `input` into `backend`.
    pub fn new<P: Into<PathBuf>>(input: P, backend: BackendConfig) -> Self {
        Config {
            input: input.into(),
            delimiters: Delimiters::default(),
            backend,
        }
    }
}

/// Opens a connection to a backend.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect, handing ownership of the handle to the caller.
    ///
    /// The backend logs its batches to `log`.
    async fn connect(&self, log: &Logger) -> Result<Box<dyn Backend>>;
}

/// Which backend to benchmark, and how to reach it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendConfig {
    /// A MongoDB collection.
    Mongo {
        /// The connection string.
        uri: String,

        /// The database name.
        database: String,

        /// The collection name.
        collection: String,
    },

    /// A Redis logical database.
    Redis {
        /// The connection URL.
        url: String,

        /// The number of commands per pipeline.
        batch_size: usize,

        /// The key pattern listed by updates, retrieves and deletes.
        pattern: String,
    },

    /// An embedded sled database.
    Sled {
        /// The database directory.
        path: PathBuf,

        /// The number of records per write batch.
        batch_size: usize,
    },
}

impl BackendConfig {
    /// The default configuration for the backend called `name`.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "mongodb" => Ok(BackendConfig::Mongo {
                uri: DEFAULT_MONGO_URI.to_owned(),
                database: DEFAULT_DATABASE.to_owned(),
                collection: DEFAULT_COLLECTION.to_owned(),
            }),
            "redis" => Ok(BackendConfig::Redis {
                url: DEFAULT_REDIS_URL.to_owned(),
                batch_size: DEFAULT_BATCH_SIZE,
                pattern: DEFAULT_PATTERN.to_owned(),
            }),
            "sled" => Ok(BackendConfig::Sled {
                path: PathBuf::from(DEFAULT_SLED_PATH),
                batch_size: DEFAULT_BATCH_SIZE,
            }),
            _ => Err(Error::Config(format!(
                "unknown backend '{}' (expected one of {})",
                name,
                BACKEND_NAMES.join(", ")
            ))),
        }
    }

    /// The backend's name.
    pub fn name(&self) -> &'static str {
        match self {
            BackendConfig::Mongo { .. } => "mongodb",
            BackendConfig::Redis { .. } => "redis",
            BackendConfig::Sled { .. } => "sled",
        }
    }

    /// Check values that the backends cannot work with.
    pub fn validate(&self) -> Result<()> {
        match self {
            BackendConfig::Redis { batch_size: 0, .. } | BackendConfig::Sled { batch_size: 0, .. } => {
                Err(Error::Config("batch size must be at least 1".to_owned()))
            }
            BackendConfig::Redis { pattern, .. } if pattern.is_empty() => {
                Err(Error::Config("key pattern must not be empty".to_owned()))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Connector for BackendConfig {
    async fn connect(&self, log: &Logger) -> Result<Box<dyn Backend>> {
        self.validate()?;
        let log = log.clone();
        let backend: Box<dyn Backend> = match self {
            BackendConfig::Mongo {
                uri,
                database,
                collection,
            } => Box::new(DocumentStore::connect(log, uri, database, collection).await?),
            BackendConfig::Redis {
                url,
                batch_size,
                pattern,
            } => Box::new(KeyValueStore::connect(log, url, *batch_size, pattern).await?),
            BackendConfig::Sled { path, batch_size } => {
                Box::new(EmbeddedStore::open(log, path, *batch_size).map_err(into_connection)?)
            }
        };
        Ok(backend)
    }
}

fn into_connection(err: Error) -> Error {
    match err {
        Error::Operation(err) => Error::Connection(err),
        err => err,
    }
}

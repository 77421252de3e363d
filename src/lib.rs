//! CRUD latency benchmarks for document and key-value stores.
//!
//! A run reads six-column records from a delimited file (see [`RecordSource`]), clears the target
//! store, then times a bulk insert, update, retrieve and delete through a [`Backend`], reporting
//! each phase's elapsed time and row count. The [`Driver`] sequences the phases and always
//! releases the backend connection.
//!
//! [`RecordSource`]: struct.RecordSource.html
//! [`Backend`]: trait.Backend.html
//! [`Driver`]: struct.Driver.html

#![deny(missing_docs)]

mod backend;
mod config;
mod driver;
mod error;
mod record;
mod report;
#[cfg(test)]
mod testing;

pub use self::backend::{
    Backend, Changes, DocumentStore, EmbeddedStore, KeyValueStore, Selector, DEFAULT_BATCH_SIZE,
};
pub use self::config::{
    BackendConfig, Config, Connector, BACKEND_NAMES, DEFAULT_COLLECTION, DEFAULT_DATABASE,
    DEFAULT_INPUT, DEFAULT_MONGO_URI, DEFAULT_PATTERN, DEFAULT_REDIS_URL, DEFAULT_SLED_PATH,
};
pub use self::driver::{benchmark, Driver, Phase, State};
pub use self::error::{Error, Result, StoreError};
pub use self::record::{Delimiters, Record, RecordSource, Records, FIELD_COUNT};
pub use self::report::{format_result, BenchmarkResult, Reporter};

use crate::driver::{Phase, State};

/// An enum representing the errors that can occur during a benchmark run.
#[derive(Debug)]
pub enum Error {
    /// Wraps IO errors that occur when reading the input file or writing a report.
    Io(std::io::Error),

    /// Indicates that a backend could not be reached, or rejected the handshake.
    Connection(StoreError),

    /// Indicates that a single store call was rejected.
    Operation(StoreError),

    /// Wraps an error with the benchmark phase that produced it.
    Phase {
        /// The phase that failed.
        phase: Phase,

        /// The underlying failure.
        source: Box<Error>,
    },

    /// Indicates that a driver operation was attempted from the wrong state.
    InvalidState {
        /// The operation that was attempted.
        operation: &'static str,

        /// The state the driver was in.
        state: State,
    },

    /// Indicates an invalid configuration value.
    Config(String),
}

/// An enum wrapping the client library errors of each backend.
#[derive(Debug)]
pub enum StoreError {
    /// An error reported by the MongoDB driver.
    Mongo(mongodb::error::Error),

    /// An error reported by the Redis client.
    Redis(redis::RedisError),

    /// An error reported by sled.
    Sled(sled::Error),

    /// Indicates a record could not be encoded for storage.
    Encode(rmp_serde::encode::Error),

    /// Indicates a stored record could not be decoded.
    Decode(rmp_serde::decode::Error),
}

impl Error {
    /// Reclassify a store error as a connection failure.
    pub fn connection<E: Into<StoreError>>(err: E) -> Error {
        Error::Connection(err.into())
    }

    /// The phase this error was raised in, if any.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Error::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Phase { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Connection(err) => write!(f, "Could not connect to backend: {}", err),
            Error::Operation(err) => write!(f, "Backend operation failed: {}", err),
            Error::Phase { phase, .. } => write!(f, "{} phase failed", phase),
            Error::InvalidState { operation, state } => {
                write!(f, "Cannot {} while driver is {:?}", operation, state)
            }
            Error::Config(message) => write!(f, "Invalid configuration: {}", message),
        }
    }
}

impl std::error::Error for StoreError {}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            StoreError::Mongo(err) => write!(f, "MongoDB error: {}", err),
            StoreError::Redis(err) => write!(f, "Redis error: {}", err),
            StoreError::Sled(err) => write!(f, "sled error: {}", err),
            StoreError::Encode(err) => write!(f, "Record encode error: {}", err),
            StoreError::Decode(err) => write!(f, "Record decode error: {}", err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Error {
        Error::Operation(err.into())
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Error {
        Error::Operation(err.into())
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Error {
        Error::Operation(err.into())
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(err: rmp_serde::encode::Error) -> Error {
        Error::Operation(err.into())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(err: rmp_serde::decode::Error) -> Error {
        Error::Operation(err.into())
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> StoreError {
        StoreError::Mongo(err)
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> StoreError {
        StoreError::Redis(err)
    }
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> StoreError {
        StoreError::Sled(err)
    }
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(err: rmp_serde::encode::Error) -> StoreError {
        StoreError::Encode(err)
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(err: rmp_serde::decode::Error) -> StoreError {
        StoreError::Decode(err)
    }
}

/// A convenience `Result` alias that pins the error to our own.
pub type Result<V> = std::result::Result<V, Error>;

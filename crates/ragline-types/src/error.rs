use thiserror::Error;

/// Errors from the one-shot retrieval and suggestion calls.
///
/// These are transport and protocol failures. An application-level failure
/// (the server answered with a non-empty `error` field) is not an error here;
/// it travels inside `RetrievalResult`.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("channel error: {0}")]
    Channel(String),
}

/// Errors from the durable state store (used by trait definitions in ragline-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors while reading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("no home directory available; set RAGLINE_DATA_DIR")]
    NoDataDir,
}

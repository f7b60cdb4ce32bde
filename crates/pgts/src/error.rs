//! Error types for the search adapter.
//!
//! Database failures are never reclassified: whatever `tokio_postgres` reports
//! (missing extension, missing index, bad operator usage) is carried as the
//! `source` of a [`BackendError::Internal`]. Local argument validation and
//! migration bookkeeping have their own categories.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all adapter operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Argument validation errors, raised before any SQL is sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Migration bookkeeping errors.
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors raised while validating caller-supplied arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An identifier (table, column, index or extension name) was empty.
    #[error("empty {kind} name")]
    EmptyIdentifier { kind: &'static str },

    /// An identifier exceeds PostgreSQL's NAMEDATALEN limit.
    #[error("{kind} name '{name}' is longer than {max} bytes")]
    IdentifierTooLong {
        kind: &'static str,
        name: String,
        max: usize,
    },

    /// The score filter was requested without naming the BM25 index.
    #[error("bm25_filter on '{field}' requires an index name")]
    MissingIndexName { field: String },

    /// An index was declared with no fields.
    #[error("index '{name}' must have at least one field")]
    NoIndexFields { name: String },

    /// Operator classes given for an index do not line up with its fields.
    #[error("index '{name}' has {fields} fields but {opclasses} operator classes")]
    OpclassMismatch {
        name: String,
        fields: usize,
        opclasses: usize,
    },

    /// A connection string could not be parsed.
    #[error("invalid connection string: {message}")]
    InvalidConnectionString { message: String },

    /// An index option is outside the range the extension accepts.
    #[error("invalid index option {option}: {message}")]
    InvalidIndexOption {
        option: &'static str,
        message: String,
    },
}

/// Errors raised while applying or reverting migrations.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// The migration has no operations.
    #[error("migration '{name}' has no operations")]
    Empty { name: String },

    /// Attempted to revert a migration that was never applied.
    #[error("migration '{name}' is not applied")]
    NotApplied { name: String },

    /// The migration artifact could not be read or written.
    #[error("migration artifact {path}: {message}")]
    Artifact { path: String, message: String },
}

/// Errors originating from the PostgreSQL connection or server.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is unavailable.
    #[error("backend unavailable: {backend_name}: {message}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },

    /// Internal backend error, usually a failed SQL statement.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for adapter operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for argument validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

impl From<tokio_postgres::Error> for StorageError {
    fn from(err: tokio_postgres::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "postgres".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

impl From<deadpool_postgres::PoolError> for StorageError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        let backend_name = "postgres".to_string();
        match err {
            deadpool_postgres::PoolError::Timeout(_) => {
                StorageError::Backend(BackendError::PoolExhausted { backend_name })
            }
            other => StorageError::Backend(BackendError::ConnectionFailed {
                backend_name,
                message: other.to_string(),
            }),
        }
    }
}

/// Wraps a failed statement with context, keeping the native error as source.
pub(crate) fn pg_error(context: &str, err: tokio_postgres::Error) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: "postgres".to_string(),
        message: format!("{}: {}", context, err),
        source: Some(Box::new(err)),
    })
}

impl StorageError {
    /// Returns the native PostgreSQL error behind this failure, if any.
    pub fn as_db_error(&self) -> Option<&tokio_postgres::error::DbError> {
        match self {
            StorageError::Backend(BackendError::Internal {
                source: Some(source),
                ..
            }) => source
                .downcast_ref::<tokio_postgres::Error>()
                .and_then(|e| e.as_db_error()),
            _ => None,
        }
    }
}

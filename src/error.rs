use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtlError>;

/// Failure categories for the storage layer. Connection and permission
/// failures abort the current batch only; a schema mismatch is fatal and
/// never silently coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    Connection,
    Permission,
    SchemaMismatch,
}

impl std::fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageErrorKind::Connection => write!(f, "connection"),
            StorageErrorKind::Permission => write!(f, "permission"),
            StorageErrorKind::SchemaMismatch => write!(f, "schema-mismatch"),
        }
    }
}

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Database error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Storage error ({kind}): {message}")]
    Storage {
        kind: StorageErrorKind,
        message: String,
    },

    #[error("Normalization failed for '{city}': {source}")]
    Normalize {
        city: String,
        source: NormalizeError,
    },

    #[error("A pipeline run is already in progress")]
    PipelineBusy,

    #[error("Invalid payload file: {0}")]
    InvalidInput(String),
}

impl EtlError {
    pub fn storage(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        EtlError::Storage {
            kind,
            message: message.into(),
        }
    }

    /// Classify an I/O failure on a storage path. Permission problems get
    /// their own kind so callers can distinguish them from transient issues.
    pub fn from_storage_io(err: std::io::Error, path: &std::path::Path) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            EtlError::storage(
                StorageErrorKind::Permission,
                format!("{}: {}", path.display(), err),
            )
        } else {
            EtlError::Io(err)
        }
    }
}

/// Unrecoverable per-city failures during normalization. The pipeline skips
/// the city and continues with the rest of the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is not numeric")]
    NotNumeric { field: &'static str },

    #[error("payload is not a JSON object")]
    NotAnObject,
}

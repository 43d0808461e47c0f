use std::io;
use thiserror::Error;

/// Error type for the bwatch library
#[derive(Error, Debug)]
pub enum BwError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Metric collection failed: {0}")]
    Collection(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Incompatible store schema: found version {found}, this build supports up to {supported}")]
    IncompatibleSchema { found: i64, supported: i64 },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for the bwatch library
pub type Result<T> = std::result::Result<T, BwError>;

impl BwError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        BwError::Configuration(msg.into())
    }

    /// Create a collection error (every metric unavailable in one cycle)
    pub fn collection<S: Into<String>>(msg: S) -> Self {
        BwError::Collection(msg.into())
    }

    pub fn store<S: Into<String>>(msg: S) -> Self {
        BwError::Store(msg.into())
    }

    pub fn other<S: Into<String>>(msg: S) -> Self {
        BwError::Other(msg.into())
    }

    /// True for failures that belong to the persistence layer.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            BwError::Store(_) | BwError::IncompatibleSchema { .. } | BwError::Sqlite(_)
        )
    }
}

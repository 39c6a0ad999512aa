//! FILENAME: core/table-engine/src/error.rs

use thiserror::Error;

/// Table definitions that can never work. Raised at construction time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("Values filter '{0}' has no options to choose from")]
    MissingFilterOptions(String),

    #[error("Page size {0} is not one of the allowed page sizes")]
    InvalidPageSize(usize),
}

/// A data source, field discovery or option lookup call failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SourceError(pub String);

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        SourceError(message.into())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Frame pipeline is already running")]
    AlreadyRunning,
}

pub type TableResult<T> = Result<T, TableError>;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid partition key: {0:?}")]
    InvalidPartitionKey(String),
    #[error("Timestamp out of range: {0}")]
    TimestampOutOfRange(i64),
    #[error("Failed to create partition {table}: {source}")]
    PartitionCreation {
        table: String,
        source: rusqlite::Error,
    },
    #[error("Sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Concurrency gate closed")]
    GateClosed,
    #[error("Background task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::sync::AcquireError> for Error {
    fn from(_: tokio::sync::AcquireError) -> Self {
        Error::GateClosed
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::TaskJoin(err.to_string())
    }
}

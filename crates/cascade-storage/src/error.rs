//! Storage failures

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Failure of a maplet or of the database backing it
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot encode or decode map entry: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Graph database failure: {0}")]
    Database(#[from] redb::Error),

    #[error("Cannot open graph database: {0}")]
    DatabaseCreation(#[from] redb::DatabaseError),

    #[error("Cannot begin transaction: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Cannot commit map update: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Cannot open table: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage backend failure: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Map '{0}' used after close")]
    Closed(String),
}

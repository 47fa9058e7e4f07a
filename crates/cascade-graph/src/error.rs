//! Error types for the dependency graph

use cascade_model::{ModelError, SymbolId};
use cascade_storage::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Delta must be differentiated before it is integrated")]
    NotDifferentiated,

    #[error("Unknown symbol id: {0:?}")]
    UnknownSymbol(SymbolId),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ModelError> for GraphError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnknownSymbol(id) => GraphError::UnknownSymbol(id),
        }
    }
}

//! Error types for the structural model

use crate::SymbolId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unknown symbol id: {0:?}")]
    UnknownSymbol(SymbolId),
}

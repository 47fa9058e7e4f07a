//! Cascade Storage - key/value maps backing the dependency graph
//!
//! The graph is stored as a set of maps keyed by symbol id, each either:
//! - transient (in-memory, for deltas and one-shot builds)
//! - persistent (redb, one table per map in a shared database file)
//!
//! The persistent database also keeps the interned symbol names so ids stay
//! meaningful across sessions.

mod error;
mod memory;
mod provider;
mod redb_storage;

pub use error::{Result, StorageError};
pub use memory::{TransientMaplet, TransientMultiMaplet};
pub use provider::{EntryVisitor, Maplet, MultiMaplet, SetVisitor};
pub use redb_storage::{GraphDatabase, RedbMaplet, RedbMultiMaplet};

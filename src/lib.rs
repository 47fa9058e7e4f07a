//! Cascade - change propagation for incremental JVM builds
//!
//! This is the root workspace crate that hosts the end-to-end tests.
//! The implementation lives in the workspace member crates.

pub use cascade_graph as graph;
pub use cascade_model as model;
pub use cascade_storage as storage;

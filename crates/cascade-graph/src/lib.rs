//! Dependency graph and change propagation for incremental builds
//!
//! A [`DependencyGraph`] records, for every compiled class, where it is
//! declared, who extends it and who uses it. Each compilation round fills a
//! fresh [`Delta`] through the [`Backend`] callbacks; the delta is then
//! differentiated against the graph, which yields the additional files to
//! recompile (or a request for a full rebuild), and finally integrated.
//!
//! ```no_run
//! use cascade_graph::{DependencyGraph, IncrementalRequest, Propagation};
//! use std::path::PathBuf;
//!
//! # fn main() -> cascade_graph::Result<()> {
//! let graph = DependencyGraph::in_memory();
//! let mut delta = graph.create_delta()?;
//! // the compiler calls delta.associate(..) for every class it emits
//! let request = IncrementalRequest::new(vec![PathBuf::from("src/A.java")]);
//! match graph.differentiate_on_incremental_make(&mut delta, &request)? {
//!     Propagation::Incremental { affected } => println!("recompile {affected:?}"),
//!     Propagation::FullRebuildRequired => println!("full rebuild"),
//! }
//! graph.integrate(delta)?;
//! # Ok(())
//! # }
//! ```

mod callbacks;
mod config;
mod constraint;
mod delayed;
mod delta;
mod differential;
mod error;
mod graph;
mod hierarchy;
mod integrate;
mod maps;

pub use callbacks::{Backend, ClassfileAnalyzer};
pub use config::GraphConfig;
pub use constraint::UsageConstraint;
pub use delayed::{ConstantAffection, ConstantAffectionResolver};
pub use delta::Delta;
pub use differential::{AllFiles, DependentFilesFilter, IncrementalRequest, Propagation};
pub use error::{GraphError, Result};
pub use graph::{DependencyGraph, GraphSnapshot};

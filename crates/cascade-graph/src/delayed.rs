//! Constant affection requests resolved after propagation
//!
//! Inlined constants leave no usage behind in the classes that read them, so
//! removing or changing one cannot be propagated through the graph. A
//! [`ConstantAffectionResolver`] answers out of band; its answers are only
//! awaited once all graph-local work of a round is done.

use cascade_model::{Access, FieldDescriptor, SymbolId};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::oneshot;

/// Files affected by a constant change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstantAffection {
    /// The resolver could not tell
    Unknown,
    Known(BTreeSet<PathBuf>),
}

/// Finds the users of an inlined constant
pub trait ConstantAffectionResolver: Send + Sync {
    /// Start a lookup. `owner` is the dotted name of the declaring class.
    fn request(
        &self,
        owner: &str,
        field: &str,
        access: Access,
        is_removed: bool,
        access_changed: bool,
    ) -> oneshot::Receiver<ConstantAffection>;
}

pub(crate) struct ConstantWork {
    pub owner: SymbolId,
    pub field: FieldDescriptor,
    pending: oneshot::Receiver<ConstantAffection>,
}

impl ConstantWork {
    pub fn new(owner: SymbolId, field: FieldDescriptor, pending: oneshot::Receiver<ConstantAffection>) -> Self {
        Self { owner, field, pending }
    }

    /// Block until the resolver answers. A dropped sender counts as
    /// [`ConstantAffection::Unknown`].
    ///
    /// Inside a multi-threaded runtime the worker is handed over while
    /// waiting. A current-thread runtime cannot be blocked, so only an answer
    /// that is already there is taken.
    pub fn wait(self) -> ConstantAffection {
        let Self { owner, field, mut pending } = self;

        let received = match Handle::try_current() {
            Err(_) => pending.blocking_recv().ok(),
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(pending)).ok()
            }
            Ok(_) => pending.try_recv().ok(),
        };

        received.unwrap_or_else(|| {
            tracing::debug!(?owner, field = ?field.name, "Constant affection request failed");
            ConstantAffection::Unknown
        })
    }
}

//! Usage records: what a compiled class references

use crate::{ElementType, SymbolId, TypeRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A reference from a compilation unit to a symbol.
///
/// Stored per class to describe what it depends on, and used as the matching
/// key when propagating a change to dependants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UsageRecord {
    /// Any mention of the class
    Class { owner: SymbolId },
    /// Instantiation of the class
    ClassNew { owner: SymbolId },
    /// Field read
    Field {
        name: SymbolId,
        owner: SymbolId,
        ty: TypeRef,
    },
    /// Field write
    FieldAssign {
        name: SymbolId,
        owner: SymbolId,
        ty: TypeRef,
    },
    /// Method call
    Method {
        name: SymbolId,
        owner: SymbolId,
        parameters: Vec<TypeRef>,
        return_type: TypeRef,
    },
    /// Call site whose overload resolution depends on the set of methods
    /// named `name` visible through `owner`
    MetaMethod { name: SymbolId, owner: SymbolId },
    /// Annotation application
    Annotation(AnnotationUsage),
}

impl UsageRecord {
    pub fn class(owner: SymbolId) -> Self {
        UsageRecord::Class { owner }
    }

    pub fn class_new(owner: SymbolId) -> Self {
        UsageRecord::ClassNew { owner }
    }

    /// The class this usage points into
    pub fn owner(&self) -> SymbolId {
        match self {
            UsageRecord::Class { owner }
            | UsageRecord::ClassNew { owner }
            | UsageRecord::Field { owner, .. }
            | UsageRecord::FieldAssign { owner, .. }
            | UsageRecord::Method { owner, .. }
            | UsageRecord::MetaMethod { owner, .. } => *owner,
            UsageRecord::Annotation(usage) => usage.annotation,
        }
    }
}

/// Application of an annotation type, or a query over such applications.
///
/// As a recorded usage, `members` are the elements given explicitly and
/// `targets` the program elements the annotation was applied to. As a query,
/// `members` are elements that lost their default and `targets` are element
/// kinds the annotation may no longer be applied to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationUsage {
    pub annotation: SymbolId,
    pub members: Option<BTreeSet<SymbolId>>,
    pub targets: Option<BTreeSet<ElementType>>,
}

impl AnnotationUsage {
    pub fn new(annotation: SymbolId) -> Self {
        Self {
            annotation,
            members: None,
            targets: None,
        }
    }

    pub fn with_members(mut self, members: impl IntoIterator<Item = SymbolId>) -> Self {
        self.members = Some(members.into_iter().collect());
        self
    }

    pub fn with_targets(mut self, targets: impl IntoIterator<Item = ElementType>) -> Self {
        self.targets = Some(targets.into_iter().collect());
        self
    }

    /// Whether a recorded `usage` is hit by this query.
    ///
    /// A member query matches usages that did not set at least one of the
    /// queried members explicitly (they relied on the removed default). A
    /// target query matches usages applied to any of the queried targets.
    pub fn satisfies(&self, usage: &AnnotationUsage) -> bool {
        if self.annotation != usage.annotation {
            return false;
        }

        let members_hit = match (&self.members, &usage.members) {
            (Some(queried), Some(given)) => queried.iter().any(|m| !given.contains(m)),
            (Some(queried), None) => !queried.is_empty(),
            (None, _) => false,
        };

        let targets_hit = match (&self.targets, &usage.targets) {
            (Some(queried), Some(applied)) => queried.intersection(applied).next().is_some(),
            _ => false,
        };

        members_hit || targets_hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_query_hits_usage_relying_on_default() {
        let query = AnnotationUsage::new(SymbolId(1)).with_members([SymbolId(10)]);

        let explicit = AnnotationUsage::new(SymbolId(1)).with_members([SymbolId(10)]);
        let implicit = AnnotationUsage::new(SymbolId(1)).with_members([SymbolId(11)]);
        let bare = AnnotationUsage::new(SymbolId(1));

        assert!(!query.satisfies(&explicit));
        assert!(query.satisfies(&implicit));
        assert!(query.satisfies(&bare));
    }

    #[test]
    fn test_target_query_needs_intersection() {
        let query = AnnotationUsage::new(SymbolId(1)).with_targets([ElementType::Field]);

        let on_field = AnnotationUsage::new(SymbolId(1)).with_targets([ElementType::Field, ElementType::Method]);
        let on_type = AnnotationUsage::new(SymbolId(1)).with_targets([ElementType::Type]);

        assert!(query.satisfies(&on_field));
        assert!(!query.satisfies(&on_type));
    }

    #[test]
    fn test_other_annotation_never_matches() {
        let query = AnnotationUsage::new(SymbolId(1)).with_members([SymbolId(10)]);
        assert!(!query.satisfies(&AnnotationUsage::new(SymbolId(2))));
    }

    #[test]
    fn test_owner_of_annotation_usage() {
        let usage = UsageRecord::Annotation(AnnotationUsage::new(SymbolId(5)));
        assert_eq!(usage.owner(), SymbolId(5));
    }
}

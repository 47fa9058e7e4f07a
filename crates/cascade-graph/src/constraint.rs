//! Residency constraints on affected usages

use crate::hierarchy::Hierarchy;
use crate::Result;
use cascade_model::{SymbolId, SymbolTable};

/// Predicate over a class holding a matched usage: the usage only affects
/// that class when the constraint holds for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageConstraint {
    /// Holds outside `package`
    Package { package: String },
    /// Holds for classes that are not known inheritors of `root`, or that
    /// live outside its package
    Inheritance { root: SymbolId, package: String },
    Negation(Box<UsageConstraint>),
    Intersection(Box<UsageConstraint>, Box<UsageConstraint>),
}

impl UsageConstraint {
    /// Holds outside the package of `class`
    pub fn package_of(class: SymbolId, symbols: &SymbolTable) -> Result<Self> {
        Ok(UsageConstraint::Package {
            package: symbols.package_of(class)?,
        })
    }

    pub fn inheritance(root: SymbolId, symbols: &SymbolTable) -> Result<Self> {
        Ok(UsageConstraint::Inheritance {
            root,
            package: symbols.package_of(root)?,
        })
    }

    pub fn negate(self) -> Self {
        UsageConstraint::Negation(Box::new(self))
    }

    pub fn and(self, other: UsageConstraint) -> Self {
        UsageConstraint::Intersection(Box::new(self), Box::new(other))
    }

    pub(crate) fn check_residence(&self, residence: SymbolId, hierarchy: &Hierarchy<'_>, symbols: &SymbolTable) -> Result<bool> {
        match self {
            UsageConstraint::Package { package } => Ok(symbols.package_of(residence)? != *package),
            UsageConstraint::Inheritance { root, package } => {
                if hierarchy.is_inheritor_of(residence, *root)? != Some(true) {
                    return Ok(true);
                }
                Ok(symbols.package_of(residence)? != *package)
            }
            UsageConstraint::Negation(inner) => Ok(!inner.check_residence(residence, hierarchy, symbols)?),
            UsageConstraint::Intersection(left, right) => {
                Ok(left.check_residence(residence, hierarchy, symbols)?
                    && right.check_residence(residence, hierarchy, symbols)?)
            }
        }
    }
}

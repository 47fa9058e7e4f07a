//! Hierarchy queries bound to a graph
//!
//! A [`Hierarchy`] resolves class descriptors against the main graph, or
//! against a delta overlaid on it: descriptors are looked up in the overlay
//! first, while subclass, dependency and source edges always come from the
//! main graph. All traversals keep a visited set, so a malformed cyclic
//! hierarchy terminates.

use crate::differential::DependentFilesFilter;
use crate::maps::{file_path, GraphMaps};
use crate::Result;
use cascade_model::{
    Access, ClassDescriptor, FieldDescriptor, MethodDescriptor, SymbolId, SymbolTable, TypeRef, UsageRecord,
    ARRAY_SUPERTYPES, CONSTRUCTOR_NAME,
};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

/// A member looked up while propagating access through subclasses
#[derive(Debug, Clone, Copy)]
pub(crate) enum MemberKey<'m> {
    Field(SymbolId),
    Method(&'m MethodDescriptor),
}

/// How candidate methods are matched against a reference method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MethodMatch {
    /// Same name and parameter types
    SameSignature,
    /// Same name and arity, with argument types no more specific
    LessSpecific,
}

/// A method found by an override search
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum MethodOrigin {
    Resolved {
        method: MethodDescriptor,
        owner: ClassDescriptor,
    },
    /// A supertype could not be resolved; assume a matching method exists there
    Unknown,
}

#[derive(Clone, Copy)]
pub(crate) struct Hierarchy<'g> {
    main: &'g GraphMaps,
    overlay: Option<&'g GraphMaps>,
    symbols: &'g SymbolTable,
}

impl<'g> Hierarchy<'g> {
    /// Resolve descriptors in the main graph only
    pub fn original(main: &'g GraphMaps, symbols: &'g SymbolTable) -> Self {
        Self {
            main,
            overlay: None,
            symbols,
        }
    }

    /// Resolve descriptors in `delta` first, then in the main graph
    pub fn updated(main: &'g GraphMaps, delta: &'g GraphMaps, symbols: &'g SymbolTable) -> Self {
        Self {
            main,
            overlay: Some(delta),
            symbols,
        }
    }

    pub fn repr_by_name(&self, name: SymbolId) -> Result<Option<ClassDescriptor>> {
        if let Some(overlay) = self.overlay {
            if let Some(repr) = overlay.repr_by_name(name)? {
                return Ok(Some(repr));
            }
        }
        self.main.repr_by_name(name)
    }

    /// Add every class that depends on `class` to `dependants`
    pub fn append_dependents(&self, class: SymbolId, dependants: &mut HashSet<SymbolId>) -> Result<()> {
        dependants.extend(self.main.dependents_of(class)?);
        Ok(())
    }

    /// Classes strictly below `class` that inherit `member` without redeclaring it.
    ///
    /// Descent into a branch stops at the first subclass that declares the
    /// member itself, and at subclasses with no known descriptor.
    pub fn propagate_member_access(&self, member: MemberKey<'_>, class: SymbolId) -> Result<HashSet<SymbolId>> {
        let mut propagated = HashSet::new();
        let mut visited = HashSet::from([class]);

        if self.repr_by_name(class)?.is_none() {
            return Ok(propagated);
        }

        let mut stack = vec![class];
        while let Some(current) = stack.pop() {
            for sub in self.main.subclasses_of(current)? {
                if !visited.insert(sub) {
                    continue;
                }
                let Some(repr) = self.repr_by_name(sub)? else {
                    continue;
                };
                let redeclared = match member {
                    MemberKey::Field(name) => repr.declares_field(name),
                    MemberKey::Method(method) => repr.declares_method(method),
                };
                if !redeclared {
                    propagated.insert(sub);
                    stack.push(sub);
                }
            }
        }

        Ok(propagated)
    }

    pub fn methods_matching(
        &self,
        class: &ClassDescriptor,
        predicate: MethodMatch,
        than: &MethodDescriptor,
    ) -> Result<Vec<MethodDescriptor>> {
        let mut found = Vec::new();
        for method in &class.methods {
            let hit = match predicate {
                MethodMatch::SameSignature => method.same_signature(than),
                MethodMatch::LessSpecific => self.less_specific(than, method)?,
            };
            if hit {
                found.push(method.clone());
            }
        }
        Ok(found)
    }

    /// Whether `candidate` could be chosen by a call that now resolves to `than`
    fn less_specific(&self, than: &MethodDescriptor, candidate: &MethodDescriptor) -> Result<bool> {
        let constructor = self.symbols.lookup(CONSTRUCTOR_NAME);
        if Some(candidate.name) == constructor
            || candidate.name != than.name
            || candidate.parameters.len() != than.parameters.len()
        {
            return Ok(false);
        }

        for (theirs, ours) in than.parameters.iter().zip(&candidate.parameters) {
            if self.is_subtype_of(theirs, ours)? == Some(false) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Methods in subclasses of `class` overriding `method`.
    ///
    /// The search stops below the first subclass on each branch that
    /// declares a visible match.
    pub fn find_overriding_methods(
        &self,
        method: &MethodDescriptor,
        class: &ClassDescriptor,
        predicate: MethodMatch,
    ) -> Result<HashSet<MethodOrigin>> {
        let mut found = HashSet::new();
        let mut visited = HashSet::from([class.name]);
        let mut stack = vec![class.clone()];

        while let Some(current) = stack.pop() {
            for sub in self.main.subclasses_of(current.name)? {
                if !visited.insert(sub) {
                    continue;
                }
                let Some(repr) = self.repr_by_name(sub)? else {
                    continue;
                };

                let mut descend = true;
                for candidate in self.methods_matching(&repr, predicate, method)? {
                    if self.is_visible_in(&current, method.access, &repr)? {
                        found.insert(MethodOrigin::Resolved {
                            method: candidate,
                            owner: repr.clone(),
                        });
                        descend = false;
                    }
                }
                if descend {
                    stack.push(repr);
                }
            }
        }

        Ok(found)
    }

    /// Methods in supertypes of `class` that `method` overrides.
    ///
    /// An unresolvable supertype yields [`MethodOrigin::Unknown`].
    pub fn find_overridden_methods(
        &self,
        method: &MethodDescriptor,
        class: &ClassDescriptor,
        predicate: MethodMatch,
    ) -> Result<HashSet<MethodOrigin>> {
        let mut found = HashSet::new();
        let mut visited = HashSet::from([class.name]);
        let mut stack = vec![class.clone()];

        while let Some(current) = stack.pop() {
            for sup in current.supers() {
                if !visited.insert(sup) {
                    continue;
                }
                let Some(repr) = self.repr_by_name(sup)? else {
                    found.insert(MethodOrigin::Unknown);
                    continue;
                };

                let mut ascend = true;
                for candidate in self.methods_matching(&repr, predicate, method)? {
                    if self.is_visible_in(&repr, candidate.access, &current)? {
                        found.insert(MethodOrigin::Resolved {
                            method: candidate,
                            owner: repr.clone(),
                        });
                        ascend = false;
                    }
                }
                if ascend {
                    stack.push(repr);
                }
            }
        }

        Ok(found)
    }

    /// Less-specific methods both above and below `class`
    pub fn find_all_methods_by_specificity(
        &self,
        method: &MethodDescriptor,
        class: &ClassDescriptor,
    ) -> Result<HashSet<MethodOrigin>> {
        let mut found = self.find_overridden_methods(method, class, MethodMatch::LessSpecific)?;
        found.extend(self.find_overriding_methods(method, class, MethodMatch::LessSpecific)?);
        Ok(found)
    }

    /// Fields in supertypes of `class` hidden by `field`
    pub fn find_overridden_fields(
        &self,
        field: &FieldDescriptor,
        class: &ClassDescriptor,
    ) -> Result<Vec<(FieldDescriptor, ClassDescriptor)>> {
        let mut found = Vec::new();
        let mut visited = HashSet::from([class.name]);
        let mut stack = vec![class.clone()];

        while let Some(current) = stack.pop() {
            for sup in current.supers() {
                if !visited.insert(sup) {
                    continue;
                }
                let Some(repr) = self.repr_by_name(sup)? else {
                    continue;
                };

                let hidden = match repr.find_field(field.name) {
                    Some(hidden) if self.is_visible_in(&repr, hidden.access, &current)? => Some(hidden.clone()),
                    _ => None,
                };
                match hidden {
                    Some(hidden) => found.push((hidden, repr)),
                    None => stack.push(repr),
                }
            }
        }

        Ok(found)
    }

    /// `Some(true)` when `who` reaches `whom` through its supertypes, `None`
    /// when that cannot be established. Never answers `Some(false)`: an
    /// unresolved supertype could always be the missing link.
    pub fn is_inheritor_of(&self, who: SymbolId, whom: SymbolId) -> Result<Option<bool>> {
        if who == whom {
            return Ok(Some(true));
        }

        let mut visited = HashSet::from([who]);
        let mut stack = vec![who];
        while let Some(current) = stack.pop() {
            let Some(repr) = self.repr_by_name(current)? else {
                continue;
            };
            for sup in repr.supers() {
                if sup == whom {
                    return Ok(Some(true));
                }
                if visited.insert(sup) {
                    stack.push(sup);
                }
            }
        }

        Ok(None)
    }

    pub fn is_subtype_of(&self, who: &TypeRef, whom: &TypeRef) -> Result<Option<bool>> {
        if who == whom {
            return Ok(Some(true));
        }

        match (who, whom) {
            (TypeRef::Primitive(_), _) | (_, TypeRef::Primitive(_)) => Ok(Some(false)),
            (TypeRef::Array(element), TypeRef::Array(whom_element)) => self.is_subtype_of(element, whom_element),
            (TypeRef::Array(_), TypeRef::Class(name)) => {
                let array_super = ARRAY_SUPERTYPES
                    .iter()
                    .any(|supertype| self.symbols.lookup(supertype) == Some(*name));
                Ok(Some(array_super))
            }
            (TypeRef::Class(who), TypeRef::Class(whom)) => self.is_inheritor_of(*who, *whom),
            (TypeRef::Class(_), TypeRef::Array(_)) => Ok(Some(false)),
        }
    }

    /// Whether `method` is declared by or inherited into `class`
    pub fn method_visible(&self, class: SymbolId, method: &MethodDescriptor) -> Result<bool> {
        let Some(repr) = self.repr_by_name(class)? else {
            return Ok(false);
        };
        if repr.declares_method(method) {
            return Ok(true);
        }
        Ok(!self
            .find_overridden_methods(method, &repr, MethodMatch::SameSignature)?
            .is_empty())
    }

    /// Whether `field` is declared by or inherited into `class`; unknown
    /// classes are assumed to see it
    pub fn field_visible(&self, class: SymbolId, field: &FieldDescriptor) -> Result<bool> {
        let Some(repr) = self.repr_by_name(class)? else {
            return Ok(true);
        };
        if repr.declares_field(field.name) {
            return Ok(true);
        }
        Ok(!self.find_overridden_fields(field, &repr)?.is_empty())
    }

    /// A member of `owner` with `access` is visible in `scope` unless it is
    /// private to another class or package-local to another package
    pub fn is_visible_in(&self, owner: &ClassDescriptor, access: Access, scope: &ClassDescriptor) -> Result<bool> {
        let private_elsewhere = access.is_private() && owner.name != scope.name;
        let package_elsewhere =
            access.is_package_local() && self.symbols.package_of(owner.name)? != self.symbols.package_of(scope.name)?;
        Ok(!private_elsewhere && !package_elsewhere)
    }

    /// Affect the files of `class` and all of its subclasses, collecting
    /// their dependants; with `with_usages`, every class usage of them too
    pub fn affect_subclasses(
        &self,
        class: SymbolId,
        affected_files: &mut BTreeSet<PathBuf>,
        affected_usages: &mut HashSet<UsageRecord>,
        dependants: &mut HashSet<SymbolId>,
        with_usages: bool,
    ) -> Result<()> {
        tracing::debug!(?class, with_usages, "Affecting subclasses of class");

        let mut visited = HashSet::from([class]);
        let mut stack = vec![class];
        while let Some(current) = stack.pop() {
            let Some(file) = self.main.source_of(current)? else {
                continue;
            };

            if with_usages {
                if let Some(repr) = self.repr_by_name(current)? {
                    affected_usages.insert(repr.create_usage());
                }
            }

            self.append_dependents(current, dependants)?;
            affected_files.insert(file_path(self.symbols, file)?);

            for sub in self.main.subclasses_of(current)? {
                if visited.insert(sub) {
                    stack.push(sub);
                }
            }
        }

        Ok(())
    }

    /// Record `root_usage` and the same access through each class of
    /// `classes`, collecting their dependants
    pub fn affect_field_usages(
        &self,
        field: &FieldDescriptor,
        classes: &HashSet<SymbolId>,
        root_usage: UsageRecord,
        affected_usages: &mut HashSet<UsageRecord>,
        dependants: &mut HashSet<SymbolId>,
    ) -> Result<()> {
        let assign = matches!(root_usage, UsageRecord::FieldAssign { .. });
        affected_usages.insert(root_usage);

        for &class in classes {
            self.append_dependents(class, dependants)?;
            affected_usages.insert(if assign {
                field.assign_usage(class)
            } else {
                field.usage(class)
            });
        }
        Ok(())
    }

    pub fn affect_method_usages(
        &self,
        method: &MethodDescriptor,
        classes: &HashSet<SymbolId>,
        root_usage: UsageRecord,
        affected_usages: &mut HashSet<UsageRecord>,
        dependants: &mut HashSet<SymbolId>,
    ) -> Result<()> {
        let meta = matches!(root_usage, UsageRecord::MetaMethod { .. });
        affected_usages.insert(root_usage);

        for &class in classes {
            self.append_dependents(class, dependants)?;
            affected_usages.insert(if meta {
                method.meta_usage(class)
            } else {
                method.usage(class)
            });
        }
        Ok(())
    }

    /// Affect every file, other than its own, declaring a dependant of `class`
    pub fn affect_all(
        &self,
        class: SymbolId,
        affected_files: &mut BTreeSet<PathBuf>,
        filter: &dyn DependentFilesFilter,
    ) -> Result<()> {
        let Some(source) = self.main.source_of(class)? else {
            return Ok(());
        };

        for dependant in self.main.dependents_of(class)? {
            let Some(file) = self.main.source_of(dependant)? else {
                continue;
            };
            if file == source {
                continue;
            }
            let path = file_path(self.symbols, file)?;
            if filter.accept(&path) {
                affected_files.insert(path);
            }
        }
        Ok(())
    }
}

//! Change propagation
//!
//! [`Differential`] compares the classes of a delta with their previous
//! shapes in the main graph and works out which other source files have to
//! be recompiled. One instance runs once per round:
//!
//! 1. files removed from the project affect every dependant of their classes;
//! 2. each compiled file is diffed, changed members collect affected usages,
//!    dependant classes and directly affected files;
//! 3. the dependants are scanned for stored usages matching the affected ones;
//! 4. pending constant lookups are awaited.
//!
//! Whenever a change cannot be bounded the run answers
//! [`Propagation::FullRebuildRequired`].

use crate::constraint::UsageConstraint;
use crate::delayed::{ConstantAffection, ConstantAffectionResolver, ConstantWork};
use crate::delta::ChangeLog;
use crate::hierarchy::{Hierarchy, MemberKey, MethodMatch, MethodOrigin};
use crate::maps::{file_path, GraphMaps};
use crate::Result;
use cascade_model::{
    diff_classes, Access, AnnotationUsage, ClassDescriptor, ClassDiff, DiffBits, ElementType, FieldDescriptor,
    RetentionPolicy, Specifier, SymbolId, SymbolTable, UsageRecord, Visibility, CONSTRUCTOR_NAME, OBJECT_CLASS,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

/// Decides whether a file may be pulled into the round when the affected
/// set is widened by package or hierarchy
pub trait DependentFilesFilter {
    fn accept(&self, file: &Path) -> bool;
}

/// Accepts every file
#[derive(Debug, Clone, Copy, Default)]
pub struct AllFiles;

impl DependentFilesFilter for AllFiles {
    fn accept(&self, _file: &Path) -> bool {
        true
    }
}

impl<F> DependentFilesFilter for F
where
    F: Fn(&Path) -> bool,
{
    fn accept(&self, file: &Path) -> bool {
        self(file)
    }
}

/// Input of an incremental propagation run
pub struct IncrementalRequest<'a> {
    /// Source files deleted since the last round
    pub removed: Vec<PathBuf>,
    /// Files scheduled for compilation this round
    pub files_to_compile: Vec<PathBuf>,
    /// Files already compiled this round; never reported as affected
    pub compiled_files: HashSet<PathBuf>,
    pub filter: &'a dyn DependentFilesFilter,
    pub resolver: Option<&'a dyn ConstantAffectionResolver>,
}

impl<'a> IncrementalRequest<'a> {
    /// Request for a round compiling `files`, all of them already compiled
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            removed: Vec::new(),
            compiled_files: files.iter().cloned().collect(),
            files_to_compile: files,
            filter: &AllFiles,
            resolver: None,
        }
    }

    pub fn with_removed(mut self, removed: Vec<PathBuf>) -> Self {
        self.removed = removed;
        self
    }

    pub fn with_compiled_files(mut self, compiled: HashSet<PathBuf>) -> Self {
        self.compiled_files = compiled;
        self
    }

    pub fn with_filter(mut self, filter: &'a dyn DependentFilesFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_resolver(mut self, resolver: &'a dyn ConstantAffectionResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

/// Outcome of an incremental propagation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Propagation {
    /// Files that must additionally be recompiled
    Incremental { affected: BTreeSet<PathBuf> },
    /// The change cannot be bounded; the whole project must be rebuilt
    FullRebuildRequired,
}

impl Propagation {
    pub fn affected(&self) -> Option<&BTreeSet<PathBuf>> {
        match self {
            Propagation::Incremental { affected } => Some(affected),
            Propagation::FullRebuildRequired => None,
        }
    }
}

/// Accumulated over all files of a round, consumed by the affected-files pass
#[derive(Default)]
struct DiffState {
    dependants: HashSet<SymbolId>,
    affected_usages: HashSet<UsageRecord>,
    annotation_queries: Vec<AnnotationUsage>,
    usage_constraints: HashMap<UsageRecord, UsageConstraint>,
}

impl DiffState {
    fn constrain(&mut self, usages: &HashSet<UsageRecord>, constraint: &UsageConstraint) {
        for usage in usages {
            self.usage_constraints.insert(usage.clone(), constraint.clone());
        }
    }
}

type Flow = ControlFlow<()>;

pub(crate) struct Differential<'a> {
    main: &'a GraphMaps,
    delta: &'a GraphMaps,
    changes: &'a mut ChangeLog,
    symbols: &'a SymbolTable,
    /// Only record hierarchy edges; compute no affected files
    easy_mode: bool,
    compiled_files: HashSet<PathBuf>,
    filter: &'a dyn DependentFilesFilter,
    resolver: Option<&'a dyn ConstantAffectionResolver>,
    affected_files: BTreeSet<PathBuf>,
    delayed: Vec<ConstantWork>,
    object_class: SymbolId,
    constructor: SymbolId,
}

impl<'a> Differential<'a> {
    pub fn easy(
        main: &'a GraphMaps,
        delta: &'a GraphMaps,
        changes: &'a mut ChangeLog,
        symbols: &'a SymbolTable,
    ) -> Self {
        Self::new(main, delta, changes, symbols, true, HashSet::new(), &AllFiles, None)
    }

    pub fn incremental(
        main: &'a GraphMaps,
        delta: &'a GraphMaps,
        changes: &'a mut ChangeLog,
        symbols: &'a SymbolTable,
        request: &IncrementalRequest<'a>,
    ) -> Self {
        Self::new(
            main,
            delta,
            changes,
            symbols,
            false,
            request.compiled_files.clone(),
            request.filter,
            request.resolver,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn new(
        main: &'a GraphMaps,
        delta: &'a GraphMaps,
        changes: &'a mut ChangeLog,
        symbols: &'a SymbolTable,
        easy_mode: bool,
        compiled_files: HashSet<PathBuf>,
        filter: &'a dyn DependentFilesFilter,
        resolver: Option<&'a dyn ConstantAffectionResolver>,
    ) -> Self {
        Self {
            main,
            delta,
            changes,
            symbols,
            easy_mode,
            compiled_files,
            filter,
            resolver,
            affected_files: BTreeSet::new(),
            delayed: Vec::new(),
            object_class: symbols.intern(OBJECT_CLASS),
            constructor: symbols.intern(CONSTRUCTOR_NAME),
        }
    }

    fn updated(&self) -> Hierarchy<'a> {
        Hierarchy::updated(self.main, self.delta, self.symbols)
    }

    fn original(&self) -> Hierarchy<'a> {
        Hierarchy::original(self.main, self.symbols)
    }

    /// Run propagation for one round. `removed` files are no longer part
    /// of the project.
    pub fn run(mut self, removed: &[PathBuf]) -> Result<Propagation> {
        if !self.easy_mode {
            self.process_disappeared_classes(removed)?;
        }

        let mut files = Vec::new();
        self.delta.source_file_to_classes.for_each_entry(&mut |file, classes| {
            files.push((file, classes.iter().cloned().collect::<Vec<_>>()));
            Ok(())
        })?;

        let mut state = DiffState::default();
        for (file, now) in files {
            let past: Option<Vec<ClassDescriptor>> = self.main.classes_of(file)?.map(|set| set.into_iter().collect());
            let classes = diff_classes(past.as_deref(), &now);

            if self.process_changed_classes(&mut state, &classes)?.is_break() {
                return Ok(Propagation::FullRebuildRequired);
            }
            self.process_removed_classes(&mut state, &classes.removed)?;
            self.process_added_classes(&classes.added)?;
        }

        if self.easy_mode {
            return Ok(Propagation::Incremental {
                affected: BTreeSet::new(),
            });
        }

        self.calculate_affected_files(&state)?;

        if self.do_delayed_work()?.is_break() {
            return Ok(Propagation::FullRebuildRequired);
        }

        for file in removed {
            self.affected_files.remove(file);
        }

        tracing::debug!(count = self.affected_files.len(), "Propagation finished");
        Ok(Propagation::Incremental {
            affected: self.affected_files,
        })
    }

    fn affect_file(&mut self, file: SymbolId) -> Result<()> {
        self.affected_files.insert(file_path(self.symbols, file)?);
        Ok(())
    }

    fn affect_file_filtered(&mut self, file: SymbolId) -> Result<()> {
        let path = file_path(self.symbols, file)?;
        if self.filter.accept(&path) {
            self.affected_files.insert(path);
        }
        Ok(())
    }

    /// Affect the file declaring `class` in the main graph, if any
    fn affect_class_file(&mut self, class: SymbolId) -> Result<()> {
        match self.main.source_of(class)? {
            Some(file) => self.affect_file(file),
            None => Ok(()),
        }
    }

    fn add_changed_class(&mut self, class: SymbolId) -> Result<()> {
        self.changes.changed_classes.insert(class);
        if let Some(file) = self.delta.source_of(class)? {
            self.changes.changed_files.insert(file);
        }
        Ok(())
    }

    /// Widen the affected set for a change of `owner` that cannot be traced
    /// through usages. Protected members pull in the files of subclasses that
    /// inherit the member, then every file of the package of `package_class`
    /// is added. Public members cannot be bounded at all.
    fn non_incremental_decision(
        &mut self,
        owner: SymbolId,
        access: Access,
        field: Option<SymbolId>,
        package_class: SymbolId,
    ) -> Result<Flow> {
        if access.is_public() {
            tracing::debug!(?owner, "Public access, switching to a non-incremental mode");
            return Ok(ControlFlow::Break(()));
        }

        if access.is_protected() {
            tracing::debug!(?owner, "Protected access, softening non-incremental decision: adding all relevant subclasses");
            let propagated = self
                .original()
                .propagate_member_access(MemberKey::Field(field.unwrap_or(SymbolId::EMPTY)), owner)?;
            for class in propagated {
                if let Some(file) = self.main.source_of(class)? {
                    self.affect_file_filtered(file)?;
                }
            }
        }

        let package = self.symbols.package_of(package_class)?;
        tracing::debug!(package = %package, "Softening non-incremental decision: adding all package classes");

        let mut entries = Vec::new();
        self.main.class_to_source_file.for_each_entry(&mut |class, file| {
            entries.push((class, *file));
            Ok(())
        })?;
        for (class, file) in entries {
            if self.symbols.package_of(class)? == package {
                self.affect_file_filtered(file)?;
            }
        }

        Ok(ControlFlow::Continue(()))
    }

    /// Queue a constant lookup, or decide right away without a resolver
    fn constant_changed(
        &mut self,
        owner: &ClassDescriptor,
        field: &FieldDescriptor,
        is_removed: bool,
        access_changed: bool,
    ) -> Result<Flow> {
        let Some(resolver) = self.resolver else {
            return self.non_incremental_decision(owner.name, field.access, Some(field.name), owner.name);
        };

        let owner_name = self.symbols.name(owner.name)?.replace('/', ".");
        let field_name = self.symbols.name(field.name)?;
        tracing::debug!(owner = %owner_name, field = %field_name, is_removed, access_changed, "Requesting constant affection");
        let pending = resolver.request(&owner_name, &field_name, field.access, is_removed, access_changed);
        self.delayed.push(ConstantWork::new(owner.name, field.clone(), pending));
        Ok(ControlFlow::Continue(()))
    }

    fn do_delayed_work(&mut self) -> Result<Flow> {
        for work in std::mem::take(&mut self.delayed) {
            let (owner, field) = (work.owner, work.field.clone());
            match work.wait() {
                ConstantAffection::Known(files) => self.affected_files.extend(files),
                ConstantAffection::Unknown => {
                    if self
                        .non_incremental_decision(owner, field.access, Some(field.name), owner)?
                        .is_break()
                    {
                        return Ok(ControlFlow::Break(()));
                    }
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn process_disappeared_classes(&mut self, removed: &[PathBuf]) -> Result<()> {
        let updated = self.updated();
        for file in removed {
            let Some(id) = self.symbols.lookup(&file.to_string_lossy()) else {
                continue;
            };
            for class in self.main.classes_of(id)?.unwrap_or_default() {
                tracing::debug!(class = ?class.name, "Class disappeared with its source file");
                updated.affect_all(class.name, &mut self.affected_files, self.filter)?;
            }
        }
        Ok(())
    }

    fn process_changed_classes(
        &mut self,
        state: &mut DiffState,
        classes: &Specifier<ClassDescriptor, ClassDiff>,
    ) -> Result<Flow> {
        let updated = self.updated();

        for changed in &classes.changed {
            let (it, now, diff) = (&changed.past, &changed.now, &changed.diff);
            tracing::debug!(class = ?it.name, "Processing changed class");
            self.add_changed_class(it.name)?;

            let added = diff.base.added_modifiers;
            let removed = diff.base.removed_modifiers;
            let superclass_changed = diff.base.changed(DiffBits::SUPERCLASS);
            let interfaces_changed = !diff.interfaces.unchanged();
            let signature_changed = diff.base.changed(DiffBits::SIGNATURE);

            if superclass_changed {
                if let Some(past_super) = it.super_class.class_name() {
                    self.changes.register_removed_super(it.name, past_super)?;
                }
                if let Some(now_super) = now.super_class.class_name() {
                    self.changes.register_added_super(it.name, now_super)?;
                }
            }
            if interfaces_changed {
                for interface in diff.interfaces.removed.iter().filter_map(|i| i.class_name()) {
                    self.changes.register_removed_super(it.name, interface)?;
                }
                for interface in diff.interfaces.added.iter().filter_map(|i| i.class_name()) {
                    self.changes.register_added_super(it.name, interface)?;
                }
            }

            if self.easy_mode {
                continue;
            }

            updated.append_dependents(it.name, &mut state.dependants)?;

            if superclass_changed || interfaces_changed || signature_changed {
                let extends_changed = superclass_changed && !diff.extends_added(self.object_class);
                let interfaces_removed = interfaces_changed && !diff.interfaces.removed.is_empty();
                tracing::debug!(class = ?it.name, "Superclass, interfaces or signature changed");
                updated.affect_subclasses(
                    it.name,
                    &mut self.affected_files,
                    &mut state.affected_usages,
                    &mut state.dependants,
                    extends_changed || interfaces_removed || signature_changed,
                )?;
            }

            if (added | removed).contains(Access::INTERFACE) {
                state.affected_usages.insert(it.create_usage());
            }

            let outer = it.outer_class.unwrap_or(SymbolId::EMPTY);
            if it.is_annotation()
                && (it.retention == Some(RetentionPolicy::Source) || now.retention == Some(RetentionPolicy::Source))
            {
                tracing::debug!(class = ?it.name, "Annotation with source retention changed");
                if self.non_incremental_decision(outer, it.access, None, it.name)?.is_break() {
                    return Ok(ControlFlow::Break(()));
                }
            }

            if added.contains(Access::PROTECTED) {
                let usage = it.create_usage();
                state
                    .usage_constraints
                    .insert(usage.clone(), UsageConstraint::inheritance(it.name, self.symbols)?);
                state.affected_usages.insert(usage);
            }

            if diff.base.package_local_on() {
                let usage = it.create_usage();
                state
                    .usage_constraints
                    .insert(usage.clone(), UsageConstraint::package_of(it.name, self.symbols)?);
                state.affected_usages.insert(usage);
            }

            if added.intersects(Access::FINAL | Access::PRIVATE) {
                state.affected_usages.insert(it.create_usage());
            }

            if added.intersects(Access::ABSTRACT | Access::STATIC) {
                state.affected_usages.insert(UsageRecord::class_new(it.name));
            }

            if it.is_annotation() {
                if diff.retention_changed {
                    state.affected_usages.insert(it.create_usage());
                } else {
                    let removed_targets = &diff.targets.removed;
                    if removed_targets.contains(&ElementType::LocalVariable) {
                        tracing::debug!(class = ?it.name, "Annotation may no longer target local variables");
                        if self.non_incremental_decision(outer, it.access, None, it.name)?.is_break() {
                            return Ok(ControlFlow::Break(()));
                        }
                    }
                    if !removed_targets.is_empty() {
                        state
                            .annotation_queries
                            .push(AnnotationUsage::new(it.name).with_targets(removed_targets.iter().copied()));
                    }
                    if diff.methods.added.iter().any(|m| !m.has_default()) {
                        state.affected_usages.insert(it.create_usage());
                    }
                }
            }

            self.process_added_methods(state, diff, it)?;
            self.process_removed_methods(state, diff, it)?;
            self.process_changed_methods(state, diff, it)?;

            self.process_added_fields(state, diff, it)?;
            if self.process_removed_fields(state, diff, it)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
            if self.process_changed_fields(state, diff, it)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }

        Ok(ControlFlow::Continue(()))
    }

    fn process_added_methods(&mut self, state: &mut DiffState, diff: &ClassDiff, it: &ClassDescriptor) -> Result<()> {
        if it.is_annotation() {
            return Ok(());
        }
        let updated = self.updated();
        let original = self.original();

        for method in &diff.methods.added {
            tracing::debug!(class = ?it.name, method = ?method.name, "Method added");

            if it.access.intersects(Access::INTERFACE | Access::ABSTRACT) || method.access.is_abstract() {
                updated.affect_subclasses(
                    it.name,
                    &mut self.affected_files,
                    &mut state.affected_usages,
                    &mut state.dependants,
                    false,
                )?;
            }

            if method.access.is_private() {
                continue;
            }

            if method.name != self.constructor
                && original
                    .find_overridden_methods(method, it, MethodMatch::SameSignature)?
                    .is_empty()
                && !method.parameters.is_empty()
            {
                // a new overload may capture calls bound to another one
                let propagated = updated.propagate_member_access(MemberKey::Method(method), it.name)?;
                updated.affect_method_usages(
                    method,
                    &propagated,
                    method.meta_usage(it.name),
                    &mut state.affected_usages,
                    &mut state.dependants,
                )?;
            }

            let related = updated.find_all_methods_by_specificity(method, it)?;
            let propagated = updated.propagate_member_access(MemberKey::Method(method), it.name)?;

            for less_specific in updated.methods_matching(it, MethodMatch::LessSpecific, method)? {
                if less_specific.same_signature(method) {
                    continue;
                }
                updated.affect_method_usages(
                    &less_specific,
                    &propagated,
                    less_specific.usage(it.name),
                    &mut state.affected_usages,
                    &mut state.dependants,
                )?;
            }

            for origin in related {
                let MethodOrigin::Resolved { method: other, owner } = origin else {
                    continue;
                };
                let is_inheritor = original.is_inheritor_of(owner.name, it.name)? == Some(true);

                if other.same_signature(method) && is_inheritor {
                    self.affect_class_file(owner.name)?;
                    continue;
                }

                let reachable = original.propagate_member_access(MemberKey::Method(&other), it.name)?;
                if is_inheritor {
                    updated.append_dependents(owner.name, &mut state.dependants)?;
                    updated.affect_method_usages(
                        &other,
                        &reachable,
                        other.usage(owner.name),
                        &mut state.affected_usages,
                        &mut state.dependants,
                    )?;
                }
                updated.affect_method_usages(
                    &other,
                    &reachable,
                    other.usage(it.name),
                    &mut state.affected_usages,
                    &mut state.dependants,
                )?;
            }

            for sub in self.main.all_subclasses(it.name)? {
                let (Some(repr), Some(file)) = (updated.repr_by_name(sub)?, self.main.source_of(sub)?) else {
                    continue;
                };
                let Some(outer) = repr.outer_class else {
                    continue;
                };
                if updated.method_visible(outer, method)? {
                    tracing::debug!(class = ?sub, "Outer class sees the added method");
                    self.affect_file(file)?;
                }
            }
        }
        Ok(())
    }

    fn process_removed_methods(&mut self, state: &mut DiffState, diff: &ClassDiff, it: &ClassDescriptor) -> Result<()> {
        let updated = self.updated();

        for method in &diff.methods.removed {
            tracing::debug!(class = ?it.name, method = ?method.name, "Method removed");
            let overridden = updated.find_overridden_methods(method, it, MethodMatch::SameSignature)?;
            let propagated = updated.propagate_member_access(MemberKey::Method(method), it.name)?;

            let callers_still_bound = !overridden.is_empty()
                && overridden.iter().all(|origin| match origin {
                    MethodOrigin::Resolved { method: other, .. } => {
                        other.return_type == method.return_type && other.signature.is_none() && method.signature.is_none()
                    }
                    MethodOrigin::Unknown => false,
                });
            if !callers_still_bound {
                updated.affect_method_usages(
                    method,
                    &propagated,
                    method.usage(it.name),
                    &mut state.affected_usages,
                    &mut state.dependants,
                )?;
            }

            for origin in updated.find_overriding_methods(method, it, MethodMatch::SameSignature)? {
                if let MethodOrigin::Resolved { owner, .. } = origin {
                    self.affect_class_file(owner.name)?;
                }
            }

            if method.access.is_abstract() {
                continue;
            }

            // subclasses that inherited the implementation and now only see
            // abstract declarations must be recompiled
            for &class in &propagated {
                if class == it.name {
                    continue;
                }
                let Some(repr) = updated.repr_by_name(class)? else {
                    continue;
                };

                let mut seen = updated.find_overridden_methods(method, &repr, MethodMatch::SameSignature)?;
                seen.extend(overridden.iter().cloned());

                let mut all_abstract = true;
                let mut visited = false;
                for origin in &seen {
                    let MethodOrigin::Resolved { method: other, owner } = origin else {
                        visited = true;
                        continue;
                    };
                    if owner.name == it.name {
                        continue;
                    }
                    visited = true;
                    all_abstract = other.access.is_abstract() || owner.is_interface();
                    if !all_abstract {
                        break;
                    }
                }

                if all_abstract && visited {
                    self.affect_class_file(class)?;
                }
            }
        }
        Ok(())
    }

    fn process_changed_methods(&mut self, state: &mut DiffState, diff: &ClassDiff, it: &ClassDescriptor) -> Result<()> {
        let updated = self.updated();

        for changed in &diff.methods.changed {
            let (method, method_diff) = (&changed.past, &changed.diff);
            let base = &method_diff.base;
            let throws_changed = method_diff.throws_changed();

            if it.is_annotation() {
                if method_diff.default_removed {
                    tracing::debug!(class = ?it.name, member = ?method.name, "Annotation member lost its default");
                    state
                        .annotation_queries
                        .push(AnnotationUsage::new(it.name).with_members([method.name]));
                }
                continue;
            }

            if base.no_change() && !throws_changed {
                continue;
            }
            tracing::debug!(class = ?it.name, method = ?method.name, "Method changed");

            let propagated = updated.propagate_member_access(MemberKey::Method(method), it.name)?;
            let mut usages = HashSet::new();
            let mut affected = false;
            let mut constrained = false;

            if base.package_local_on() {
                updated.affect_method_usages(
                    method,
                    &propagated,
                    method.usage(it.name),
                    &mut usages,
                    &mut state.dependants,
                )?;
                state.constrain(&usages, &UsageConstraint::inheritance(it.name, self.symbols)?);
                state.affected_usages.extend(usages.iter().cloned());
                affected = true;
                constrained = true;
            }

            if base.changed(DiffBits::TYPE | DiffBits::SIGNATURE) || throws_changed {
                if !affected {
                    updated.affect_method_usages(
                        method,
                        &propagated,
                        method.usage(it.name),
                        &mut state.affected_usages,
                        &mut state.dependants,
                    )?;
                }

                for origin in updated.find_overriding_methods(method, it, MethodMatch::SameSignature)? {
                    let MethodOrigin::Resolved { method: overrider, owner } = origin else {
                        continue;
                    };
                    tracing::debug!(class = ?owner.name, "Overriding method must follow the changed declaration");
                    self.affect_class_file(owner.name)?;
                    let below = updated.propagate_member_access(MemberKey::Method(&overrider), owner.name)?;
                    updated.append_dependents(owner.name, &mut state.dependants)?;
                    updated.affect_method_usages(
                        &overrider,
                        &below,
                        overrider.usage(owner.name),
                        &mut state.affected_usages,
                        &mut state.dependants,
                    )?;
                }
            } else if base.changed(DiffBits::ACCESS) {
                let added = base.added_modifiers;
                let removed = base.removed_modifiers;

                if added.intersects(Access::STATIC | Access::PRIVATE) || removed.contains(Access::STATIC) {
                    if !affected {
                        updated.affect_method_usages(
                            method,
                            &propagated,
                            method.usage(it.name),
                            &mut state.affected_usages,
                            &mut state.dependants,
                        )?;
                    }
                    if added.contains(Access::STATIC) {
                        updated.affect_subclasses(
                            it.name,
                            &mut self.affected_files,
                            &mut state.affected_usages,
                            &mut state.dependants,
                            false,
                        )?;
                    }
                } else {
                    if added.intersects(Access::FINAL | Access::PUBLIC | Access::ABSTRACT) {
                        updated.affect_subclasses(
                            it.name,
                            &mut self.affected_files,
                            &mut state.affected_usages,
                            &mut state.dependants,
                            false,
                        )?;
                    }

                    if added.contains(Access::PROTECTED) && !removed.contains(Access::PRIVATE) && !constrained {
                        if !affected {
                            updated.affect_method_usages(
                                method,
                                &propagated,
                                method.usage(it.name),
                                &mut usages,
                                &mut state.dependants,
                            )?;
                            state.affected_usages.extend(usages.iter().cloned());
                        }
                        state.constrain(&usages, &UsageConstraint::inheritance(it.name, self.symbols)?);
                    }
                }
            }
        }
        Ok(())
    }

    fn process_added_fields(&mut self, state: &mut DiffState, diff: &ClassDiff, it: &ClassDescriptor) -> Result<()> {
        let updated = self.updated();
        let original = self.original();

        for field in &diff.fields.added {
            tracing::debug!(class = ?it.name, field = ?field.name, "Field added");

            if !field.access.is_private() {
                for sub in self.main.all_subclasses(it.name)? {
                    if let (Some(repr), Some(file)) = (updated.repr_by_name(sub)?, self.main.source_of(sub)?) {
                        let hides_locals = repr.is_local;
                        let hides_outer = match repr.outer_class {
                            Some(outer) if !outer.is_empty() => updated.field_visible(outer, field)?,
                            _ => false,
                        };
                        if hides_locals || hides_outer {
                            tracing::debug!(class = ?sub, "Added field may hide an enclosing name");
                            self.affect_file(file)?;
                        }
                    }

                    let propagated = updated.propagate_member_access(MemberKey::Field(field.name), sub)?;
                    updated.affect_field_usages(
                        field,
                        &propagated,
                        field.usage(sub),
                        &mut state.affected_usages,
                        &mut state.dependants,
                    )?;
                    updated.append_dependents(sub, &mut state.dependants)?;
                }
            }

            for (hidden, owner) in updated.find_overridden_fields(field, it)? {
                if hidden.access.is_private() {
                    continue;
                }

                let propagated = original.propagate_member_access(MemberKey::Field(hidden.name), owner.name)?;
                let mut usages = HashSet::new();
                updated.affect_field_usages(
                    &hidden,
                    &propagated,
                    hidden.usage(owner.name),
                    &mut usages,
                    &mut state.dependants,
                )?;

                if let Some(constraint) = self.hiding_constraint(field.access, hidden.access, owner.name)? {
                    state.constrain(&usages, &constraint);
                }
                state.affected_usages.extend(usages);
            }
        }
        Ok(())
    }

    /// Which readers of a field of `owner` with `hidden` access are rebound
    /// by a new field with `added` access; `None` means all of them
    fn hiding_constraint(&self, added: Access, hidden: Access, owner: SymbolId) -> Result<Option<UsageConstraint>> {
        use Visibility::*;

        let constraint = match (added.visibility(), hidden.visibility()) {
            (Private, _) | (Public, Public | Package) | (Protected, Protected) | (Package, Package) => None,
            (Public, Protected) | (Protected, Public | Package) => {
                Some(UsageConstraint::inheritance(owner, self.symbols)?.negate())
            }
            _ => Some(
                UsageConstraint::inheritance(owner, self.symbols)?
                    .negate()
                    .and(UsageConstraint::package_of(owner, self.symbols)?.negate()),
            ),
        };
        Ok(constraint)
    }

    fn process_removed_fields(&mut self, state: &mut DiffState, diff: &ClassDiff, it: &ClassDescriptor) -> Result<Flow> {
        let updated = self.updated();

        for field in &diff.fields.removed {
            tracing::debug!(class = ?it.name, field = ?field.name, "Field removed");

            if !field.access.is_private()
                && field.access.is_inlinable()
                && field.has_value()
                && self.constant_changed(it, field, true, false)?.is_break()
            {
                return Ok(ControlFlow::Break(()));
            }

            let propagated = updated.propagate_member_access(MemberKey::Field(field.name), it.name)?;
            updated.affect_field_usages(
                field,
                &propagated,
                field.usage(it.name),
                &mut state.affected_usages,
                &mut state.dependants,
            )?;
        }
        Ok(ControlFlow::Continue(()))
    }

    fn process_changed_fields(&mut self, state: &mut DiffState, diff: &ClassDiff, it: &ClassDescriptor) -> Result<Flow> {
        let updated = self.updated();

        for changed in &diff.fields.changed {
            let (field, base) = (&changed.past, &changed.diff.base);
            tracing::debug!(class = ?it.name, field = ?field.name, "Field changed");

            if !field.access.is_private() && field.access.is_inlinable() {
                let modifiers = base.changed_modifiers();
                let harmful = modifiers.intersects(Access::STATIC | Access::FINAL);
                let access_changed = modifiers.intersects(Access::VISIBILITY);
                let value_changed = base.changed(DiffBits::VALUE) && base.had_value();

                if (harmful || value_changed || (access_changed && !base.became_stronger()))
                    && self.constant_changed(it, field, false, access_changed)?.is_break()
                {
                    return Ok(ControlFlow::Break(()));
                }
            }

            if base.no_change() {
                continue;
            }

            let propagated = updated.propagate_member_access(MemberKey::Field(field.name), it.name)?;

            if base.changed(DiffBits::TYPE | DiffBits::SIGNATURE) {
                updated.affect_field_usages(
                    field,
                    &propagated,
                    field.usage(it.name),
                    &mut state.affected_usages,
                    &mut state.dependants,
                )?;
            } else if base.changed(DiffBits::ACCESS) {
                let added = base.added_modifiers;
                let removed = base.removed_modifiers;

                if added.intersects(Access::STATIC | Access::PRIVATE | Access::VOLATILE) || removed.contains(Access::STATIC) {
                    updated.affect_field_usages(
                        field,
                        &propagated,
                        field.usage(it.name),
                        &mut state.affected_usages,
                        &mut state.dependants,
                    )?;
                } else {
                    let mut usages = HashSet::new();
                    let mut affected = false;

                    if added.contains(Access::FINAL) {
                        updated.affect_field_usages(
                            field,
                            &propagated,
                            field.assign_usage(it.name),
                            &mut usages,
                            &mut state.dependants,
                        )?;
                        state.affected_usages.extend(usages.iter().cloned());
                        affected = true;
                    }

                    if removed.contains(Access::PUBLIC) {
                        if !affected {
                            updated.affect_field_usages(
                                field,
                                &propagated,
                                field.usage(it.name),
                                &mut usages,
                                &mut state.dependants,
                            )?;
                            state.affected_usages.extend(usages.iter().cloned());
                        }
                        let constraint = if added.contains(Access::PROTECTED) {
                            UsageConstraint::inheritance(it.name, self.symbols)?
                        } else {
                            UsageConstraint::package_of(it.name, self.symbols)?
                        };
                        state.constrain(&usages, &constraint);
                    }
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn process_removed_classes(&mut self, state: &mut DiffState, removed: &[ClassDescriptor]) -> Result<()> {
        for class in removed {
            tracing::debug!(class = ?class.name, "Class removed");

            // a class moved to another compiled file is not deleted
            if !self.delta.class_to_source_file.contains_key(class.name)? {
                self.changes.deleted_classes.insert(class.clone());
            }
            if let Some(file) = self.main.source_of(class.name)? {
                self.changes.changed_files.insert(file);
            }

            if !self.easy_mode {
                self.updated().append_dependents(class.name, &mut state.dependants)?;
                state.affected_usages.insert(class.create_usage());
            }
        }
        Ok(())
    }

    fn process_added_classes(&mut self, added: &[ClassDescriptor]) -> Result<()> {
        for class in added {
            tracing::debug!(class = ?class.name, "Class added");
            self.add_changed_class(class.name)?;
            for sup in class.supers() {
                self.changes.register_added_super(class.name, sup)?;
            }

            if self.easy_mode {
                continue;
            }

            // classes that referred to this name before it existed
            for dependant in self.main.dependents_of(class.name)? {
                if let Some(file) = self.main.source_of(dependant)? {
                    self.affect_file_filtered(file)?;
                }
            }
        }
        Ok(())
    }

    fn calculate_affected_files(&mut self, state: &DiffState) -> Result<()> {
        let updated = self.updated();
        let original = self.original();

        for &dependant in &state.dependants {
            let Some(file) = self.main.source_of(dependant)? else {
                continue;
            };
            let path = file_path(self.symbols, file)?;
            if self.affected_files.contains(&path) || self.compiled_files.contains(&path) {
                continue;
            }
            let Some(repr) = original.repr_by_name(dependant)? else {
                continue;
            };

            if self.uses_affected(state, &repr, &updated)? {
                tracing::debug!(class = ?dependant, file = %path.display(), "Dependant affected");
                self.affected_files.insert(path);
            }
        }
        Ok(())
    }

    fn uses_affected(&self, state: &DiffState, repr: &ClassDescriptor, hierarchy: &Hierarchy<'_>) -> Result<bool> {
        for usage in &repr.usages {
            if state.affected_usages.contains(usage) {
                match state.usage_constraints.get(usage) {
                    None => return Ok(true),
                    Some(constraint) => {
                        if constraint.check_residence(repr.name, hierarchy, self.symbols)? {
                            return Ok(true);
                        }
                    }
                }
            }

            if let UsageRecord::Annotation(applied) = usage {
                if state.annotation_queries.iter().any(|query| query.satisfies(applied)) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

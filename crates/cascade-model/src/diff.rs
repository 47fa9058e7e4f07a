//! Structural diff between two shapes of the same class or member
//!
//! Every diff is computed from `past` to `now`. Collections are compared as
//! sets keyed by identity (see [`crate::member`]); elements present on both
//! sides are compared by content and reported as changed only when their
//! content differs.

use crate::{Access, ClassDescriptor, ElementType, FieldDescriptor, MethodDescriptor, SymbolId, TypeRef};
use bitflags::bitflags;
use std::collections::HashSet;
use std::hash::Hash;

bitflags! {
    /// Aspects of a class or member that changed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DiffBits: u32 {
        const ACCESS = 1;
        const TYPE = 2;
        const VALUE = 4;
        const SIGNATURE = 8;
        const SUPERCLASS = 16;
        const USAGES = 32;
    }
}

/// Classification of a single-entity change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Difference {
    pub bits: DiffBits,
    pub added_modifiers: Access,
    pub removed_modifiers: Access,
    past_access: Access,
    now_access: Access,
    had_value: bool,
    has_value: bool,
}

impl Difference {
    fn new(past_access: Access, now_access: Access) -> Self {
        let mut bits = DiffBits::empty();
        if past_access != now_access {
            bits |= DiffBits::ACCESS;
        }
        Self {
            bits,
            added_modifiers: now_access.difference(past_access),
            removed_modifiers: past_access.difference(now_access),
            past_access,
            now_access,
            had_value: false,
            has_value: false,
        }
    }

    fn mark(&mut self, bit: DiffBits, changed: bool) {
        if changed {
            self.bits |= bit;
        }
    }

    pub fn no_change(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn changed(&self, bit: DiffBits) -> bool {
        self.bits.intersects(bit)
    }

    /// Modifiers that were added or removed
    pub fn changed_modifiers(&self) -> Access {
        self.added_modifiers | self.removed_modifiers
    }

    /// Visibility narrowed (e.g. public to protected)
    pub fn became_weaker(&self) -> bool {
        self.now_access.weaker_than(self.past_access)
    }

    /// Visibility widened (e.g. private to package-local)
    pub fn became_stronger(&self) -> bool {
        self.past_access.weaker_than(self.now_access)
    }

    /// A visibility modifier was removed and the entity is now package-local
    pub fn package_local_on(&self) -> bool {
        self.removed_modifiers.intersects(Access::VISIBILITY) && self.now_access.is_package_local()
    }

    /// The past shape carried a constant value
    pub fn had_value(&self) -> bool {
        self.had_value
    }

    /// A previously present constant value is gone
    pub fn constant_removed(&self) -> bool {
        self.had_value && !self.has_value
    }
}

/// Two shapes of one entity and what changed between them
#[derive(Debug, Clone)]
pub struct Changed<T, D> {
    pub past: T,
    pub now: T,
    pub diff: D,
}

/// Collection diff: added, removed and changed elements
#[derive(Debug, Clone)]
pub struct Specifier<T, D = ()> {
    pub added: Vec<T>,
    pub removed: Vec<T>,
    pub changed: Vec<Changed<T, D>>,
}

impl<T, D> Specifier<T, D> {
    pub fn unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

impl<T, D> Default for Specifier<T, D> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            changed: Vec::new(),
        }
    }
}

/// Diff two collections keyed by element identity.
///
/// `compare(past, now)` returns `None` when the two shapes have the same
/// content. A missing `past` reports every element of `now` as added.
pub fn diff_sets<T, D>(
    past: Option<&[T]>,
    now: &[T],
    compare: impl Fn(&T, &T) -> Option<D>,
) -> Specifier<T, D>
where
    T: Eq + Hash + Clone,
{
    let Some(past) = past else {
        return Specifier {
            added: now.to_vec(),
            ..Specifier::default()
        };
    };

    let past_index: HashSet<&T> = past.iter().collect();
    let now_index: HashSet<&T> = now.iter().collect();
    let mut result = Specifier::default();

    for item in now {
        match past_index.get(item) {
            None => result.added.push(item.clone()),
            Some(old) => {
                if let Some(diff) = compare(*old, item) {
                    result.changed.push(Changed {
                        past: (*old).clone(),
                        now: item.clone(),
                        diff,
                    });
                }
            }
        }
    }

    result.removed = past.iter().filter(|item| !now_index.contains(item)).cloned().collect();
    result
}

/// Membership-only diff (interfaces, thrown types, annotation targets)
pub fn plain_diff<T: Eq + Hash + Clone>(past: &[T], now: &[T]) -> Specifier<T> {
    diff_sets(Some(past), now, |_, _| None)
}

#[derive(Debug, Clone)]
pub struct FieldDiff {
    pub base: Difference,
}

impl FieldDiff {
    pub fn between(past: &FieldDescriptor, now: &FieldDescriptor) -> Self {
        let mut base = Difference::new(past.access, now.access);
        base.mark(DiffBits::TYPE, past.ty != now.ty);
        base.mark(DiffBits::SIGNATURE, past.signature != now.signature);
        base.mark(DiffBits::VALUE, past.value != now.value);
        base.had_value = past.has_value();
        base.has_value = now.has_value();
        Self { base }
    }

    pub fn no_change(&self) -> bool {
        self.base.no_change()
    }
}

#[derive(Debug, Clone)]
pub struct MethodDiff {
    pub base: Difference,
    pub exceptions: Specifier<TypeRef>,
    pub default_removed: bool,
    pub default_added: bool,
}

impl MethodDiff {
    pub fn between(past: &MethodDescriptor, now: &MethodDescriptor) -> Self {
        let mut base = Difference::new(past.access, now.access);
        base.mark(DiffBits::TYPE, past.return_type != now.return_type);
        base.mark(DiffBits::SIGNATURE, past.signature != now.signature);
        base.mark(DiffBits::VALUE, past.default_value != now.default_value);
        base.had_value = past.has_default();
        base.has_value = now.has_default();

        Self {
            base,
            exceptions: plain_diff(&past.exceptions, &now.exceptions),
            default_removed: past.has_default() && !now.has_default(),
            default_added: !past.has_default() && now.has_default(),
        }
    }

    pub fn no_change(&self) -> bool {
        self.base.no_change() && self.exceptions.unchanged()
    }

    /// Thrown types were added or changed
    pub fn throws_changed(&self) -> bool {
        !self.exceptions.added.is_empty() || !self.exceptions.changed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ClassDiff {
    pub base: Difference,
    pub interfaces: Specifier<TypeRef>,
    pub fields: Specifier<FieldDescriptor, FieldDiff>,
    pub methods: Specifier<MethodDescriptor, MethodDiff>,
    pub targets: Specifier<ElementType>,
    pub retention_changed: bool,
    past_super_class: TypeRef,
}

impl ClassDiff {
    pub fn between(past: &ClassDescriptor, now: &ClassDescriptor) -> Self {
        let mut base = Difference::new(past.access, now.access);
        base.mark(DiffBits::SIGNATURE, past.signature != now.signature);
        base.mark(DiffBits::SUPERCLASS, past.super_class != now.super_class);
        base.mark(DiffBits::USAGES, past.usages != now.usages);

        let fields = diff_sets(Some(past.fields.as_slice()), &now.fields, |p, n| {
            let diff = FieldDiff::between(p, n);
            (!diff.no_change()).then_some(diff)
        });
        let methods = diff_sets(Some(past.methods.as_slice()), &now.methods, |p, n| {
            let diff = MethodDiff::between(p, n);
            (!diff.no_change()).then_some(diff)
        });

        let past_targets: Vec<ElementType> = past.targets.iter().copied().collect();
        let now_targets: Vec<ElementType> = now.targets.iter().copied().collect();

        Self {
            base,
            interfaces: plain_diff(&past.interfaces, &now.interfaces),
            fields,
            methods,
            targets: plain_diff(&past_targets, &now_targets),
            retention_changed: past.retention != now.retention,
            past_super_class: past.super_class.clone(),
        }
    }

    pub fn no_change(&self) -> bool {
        self.base.no_change()
            && self.interfaces.unchanged()
            && self.fields.unchanged()
            && self.methods.unchanged()
            && self.targets.unchanged()
            && !self.retention_changed
    }

    /// The superclass changed away from the root object type, i.e. an
    /// `extends` clause was introduced rather than replaced
    pub fn extends_added(&self, object_class: SymbolId) -> bool {
        self.base.changed(DiffBits::SUPERCLASS) && self.past_super_class == TypeRef::Class(object_class)
    }
}

/// Diff the classes of one source file
pub fn diff_classes(past: Option<&[ClassDescriptor]>, now: &[ClassDescriptor]) -> Specifier<ClassDescriptor, ClassDiff> {
    diff_sets(past, now, |p, n| {
        let diff = ClassDiff::between(p, n);
        (!diff.no_change()).then_some(diff)
    })
}

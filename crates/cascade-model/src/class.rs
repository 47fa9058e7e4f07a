//! Class descriptors

use crate::{Access, FieldDescriptor, MethodDescriptor, SymbolId, TypeRef, UsageRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::hash::{Hash, Hasher};

/// Retention of an annotation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetentionPolicy {
    Source,
    Class,
    Runtime,
}

/// Program elements an annotation type may be applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementType {
    Type,
    Field,
    Method,
    Parameter,
    Constructor,
    LocalVariable,
    AnnotationType,
    Package,
    TypeParameter,
    TypeUse,
}

/// Post-compilation shape of one class.
///
/// Equality and hashing use only `name`; two descriptors of the same class
/// from different compilations are "the same" entity with possibly different
/// content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDescriptor {
    pub name: SymbolId,
    /// Class file the descriptor was read from
    pub class_file: SymbolId,
    pub access: Access,
    pub signature: Option<SymbolId>,
    pub super_class: TypeRef,
    pub interfaces: Vec<TypeRef>,
    pub fields: Vec<FieldDescriptor>,
    pub methods: Vec<MethodDescriptor>,
    pub usages: HashSet<UsageRecord>,
    pub outer_class: Option<SymbolId>,
    /// Local or anonymous class
    pub is_local: bool,
    pub retention: Option<RetentionPolicy>,
    pub targets: BTreeSet<ElementType>,
}

impl ClassDescriptor {
    /// A class with no members extending `super_class`
    pub fn new(name: SymbolId, access: Access, super_class: SymbolId) -> Self {
        Self {
            name,
            class_file: SymbolId::EMPTY,
            access,
            signature: None,
            super_class: TypeRef::Class(super_class),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            usages: HashSet::new(),
            outer_class: None,
            is_local: false,
            retention: None,
            targets: BTreeSet::new(),
        }
    }

    pub fn with_class_file(mut self, class_file: SymbolId) -> Self {
        self.class_file = class_file;
        self
    }

    pub fn with_signature(mut self, signature: SymbolId) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn with_interface(mut self, interface: SymbolId) -> Self {
        self.interfaces.push(TypeRef::Class(interface));
        self
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.retain(|f| f != &field);
        self.fields.push(field);
        self
    }

    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.retain(|m| m != &method);
        self.methods.push(method);
        self
    }

    pub fn with_usage(mut self, usage: UsageRecord) -> Self {
        self.usages.insert(usage);
        self
    }

    pub fn with_usages(mut self, usages: impl IntoIterator<Item = UsageRecord>) -> Self {
        self.usages.extend(usages);
        self
    }

    pub fn with_outer_class(mut self, outer: SymbolId) -> Self {
        self.outer_class = Some(outer);
        self
    }

    pub fn local(mut self) -> Self {
        self.is_local = true;
        self
    }

    /// Turn this class into an annotation type
    pub fn annotation(mut self, retention: RetentionPolicy, targets: impl IntoIterator<Item = ElementType>) -> Self {
        self.access |= Access::ANNOTATION | Access::INTERFACE | Access::ABSTRACT;
        self.retention = Some(retention);
        self.targets = targets.into_iter().collect();
        self
    }

    pub fn is_annotation(&self) -> bool {
        self.access.contains(Access::ANNOTATION)
    }

    pub fn is_interface(&self) -> bool {
        self.access.is_interface()
    }

    /// Direct supertypes: superclass first, then interfaces
    pub fn supers(&self) -> impl Iterator<Item = SymbolId> + '_ {
        std::iter::once(&self.super_class)
            .chain(self.interfaces.iter())
            .filter_map(TypeRef::class_name)
    }

    pub fn find_field(&self, name: SymbolId) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn declares_field(&self, name: SymbolId) -> bool {
        self.find_field(name).is_some()
    }

    /// Whether this class declares a method with the same name and parameters
    pub fn declares_method(&self, method: &MethodDescriptor) -> bool {
        self.methods.iter().any(|m| m.same_signature(method))
    }

    /// Usage standing for "any mention of this class"
    pub fn create_usage(&self) -> UsageRecord {
        UsageRecord::class(self.name)
    }

    /// Same descriptor with one more recorded usage; `None` if it was already there
    pub fn adding_usage(&self, usage: UsageRecord) -> Option<ClassDescriptor> {
        if self.usages.contains(&usage) {
            return None;
        }
        Some(self.clone().with_usage(usage))
    }
}

impl PartialEq for ClassDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ClassDescriptor {}

impl Hash for ClassDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

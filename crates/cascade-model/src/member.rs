//! Field and method descriptors
//!
//! Members compare by identity only: fields by name, methods by name and
//! parameter types. Everything else is content, compared by [`crate::diff`].

use crate::{Access, ConstantValue, SymbolId, TypeRef, UsageRecord};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A declared field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: SymbolId,
    pub access: Access,
    pub ty: TypeRef,
    /// Generic signature, if any
    pub signature: Option<SymbolId>,
    /// Constant initializer (only meaningful for `static final` fields)
    pub value: Option<ConstantValue>,
}

impl FieldDescriptor {
    pub fn new(name: SymbolId, access: Access, ty: TypeRef) -> Self {
        Self {
            name,
            access,
            ty,
            signature: None,
            value: None,
        }
    }

    pub fn with_value(mut self, value: ConstantValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_signature(mut self, signature: SymbolId) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// A read of this field through `owner`
    pub fn usage(&self, owner: SymbolId) -> UsageRecord {
        UsageRecord::Field {
            name: self.name,
            owner,
            ty: self.ty.clone(),
        }
    }

    /// A write to this field through `owner`
    pub fn assign_usage(&self, owner: SymbolId) -> UsageRecord {
        UsageRecord::FieldAssign {
            name: self.name,
            owner,
            ty: self.ty.clone(),
        }
    }
}

impl PartialEq for FieldDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for FieldDescriptor {}

impl Hash for FieldDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// A declared method (constructors use the `<init>` name)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: SymbolId,
    pub access: Access,
    pub parameters: Vec<TypeRef>,
    pub return_type: TypeRef,
    pub signature: Option<SymbolId>,
    pub exceptions: Vec<TypeRef>,
    /// Default value of an annotation element
    pub default_value: Option<ConstantValue>,
}

impl MethodDescriptor {
    pub fn new(name: SymbolId, access: Access, parameters: Vec<TypeRef>, return_type: TypeRef) -> Self {
        Self {
            name,
            access,
            parameters,
            return_type,
            signature: None,
            exceptions: Vec::new(),
            default_value: None,
        }
    }

    pub fn with_exceptions(mut self, exceptions: Vec<TypeRef>) -> Self {
        self.exceptions = exceptions;
        self
    }

    pub fn with_default(mut self, value: ConstantValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_signature(mut self, signature: SymbolId) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn has_default(&self) -> bool {
        self.default_value.is_some()
    }

    /// Same name and parameter types, i.e. one would override the other
    pub fn same_signature(&self, other: &MethodDescriptor) -> bool {
        self.name == other.name && self.parameters == other.parameters
    }

    /// A call of this method through `owner`
    pub fn usage(&self, owner: SymbolId) -> UsageRecord {
        UsageRecord::Method {
            name: self.name,
            owner,
            parameters: self.parameters.clone(),
            return_type: self.return_type.clone(),
        }
    }

    /// A dispatch-sensitive reference: any call that overload resolution could
    /// now bind differently
    pub fn meta_usage(&self, owner: SymbolId) -> UsageRecord {
        UsageRecord::MetaMethod {
            name: self.name,
            owner,
        }
    }
}

impl PartialEq for MethodDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.same_signature(other)
    }
}

impl Eq for MethodDescriptor {}

impl Hash for MethodDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.parameters.hash(state);
    }
}

//! Type references and constant values

use crate::SymbolId;
use serde::{Deserialize, Serialize};

/// Primitive types, including `void` for method returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Primitive {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

/// A reference to a type as it appears in a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeRef {
    Primitive(Primitive),
    Array(Box<TypeRef>),
    Class(SymbolId),
}

impl TypeRef {
    pub fn array_of(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    /// The class named by this reference, if it names one directly
    pub fn class_name(&self) -> Option<SymbolId> {
        match self {
            TypeRef::Class(name) => Some(*name),
            _ => None,
        }
    }
}

/// Compile-time constant attached to a field or used as an annotation default.
///
/// Floating point values are kept as raw bits so constants can be hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstantValue {
    Integer(i64),
    FloatBits(u64),
    Boolean(bool),
    Char(char),
    Text(String),
}

impl ConstantValue {
    pub fn float(value: f64) -> Self {
        ConstantValue::FloatBits(value.to_bits())
    }
}

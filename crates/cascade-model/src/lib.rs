//! Structural model of compiled classes
//!
//! This crate describes the post-compilation shape of classes and members,
//! the usages a class makes of other symbols, and the structural diff between
//! two shapes of the same class.
//!
//! Names are interned into a [`SymbolTable`] and referred to by [`SymbolId`].

pub mod access;
pub mod class;
pub mod diff;
pub mod error;
pub mod member;
pub mod symbol;
pub mod types;
pub mod usage;

pub use access::{Access, Visibility};
pub use class::{ClassDescriptor, ElementType, RetentionPolicy};
pub use diff::{
    diff_classes, diff_sets, plain_diff, Changed, ClassDiff, DiffBits, Difference, FieldDiff, MethodDiff, Specifier,
};
pub use error::ModelError;
pub use member::{FieldDescriptor, MethodDescriptor};
pub use symbol::{
    internal_name, package_name, SymbolId, SymbolTable, ARRAY_SUPERTYPES, CONSTRUCTOR_NAME, OBJECT_CLASS,
};
pub use types::{ConstantValue, Primitive, TypeRef};
pub use usage::{AnnotationUsage, UsageRecord};

//! Access flags of classes and members

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Declared modifiers, using the class-file flag values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Access: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

/// The four visibility levels, most restrictive first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Visibility {
    Private,
    Package,
    Protected,
    Public,
}

impl Access {
    /// Visibility bits only.
    pub const VISIBILITY: Access = Access::PUBLIC.union(Access::PRIVATE).union(Access::PROTECTED);

    /// Modifiers that let a compiler inline a field's value at use sites.
    pub const INLINABLE: Access = Access::STATIC.union(Access::FINAL);

    pub fn is_public(self) -> bool {
        self.contains(Access::PUBLIC)
    }

    pub fn is_private(self) -> bool {
        self.contains(Access::PRIVATE)
    }

    pub fn is_protected(self) -> bool {
        self.contains(Access::PROTECTED)
    }

    /// No visibility modifier at all.
    pub fn is_package_local(self) -> bool {
        !self.intersects(Access::VISIBILITY)
    }

    pub fn is_abstract(self) -> bool {
        self.contains(Access::ABSTRACT)
    }

    pub fn is_interface(self) -> bool {
        self.contains(Access::INTERFACE)
    }

    /// `static final`
    pub fn is_inlinable(self) -> bool {
        self.contains(Access::INLINABLE)
    }

    pub fn visibility(self) -> Visibility {
        if self.is_public() {
            Visibility::Public
        } else if self.is_protected() {
            Visibility::Protected
        } else if self.is_private() {
            Visibility::Private
        } else {
            Visibility::Package
        }
    }

    /// Whether `self` is more restrictive than `then` in the
    /// public > protected > package-private > private ordering.
    pub fn weaker_than(self, then: Access) -> bool {
        (self.is_private() && !then.is_private())
            || (self.is_protected() && then.is_public())
            || (self.is_package_local() && then.is_protected())
    }
}

//! Class kinds as reported by the linker frontend.

/// The kind of a linked class.
///
/// Only the first three kinds materialize as nodes of the class hierarchy
/// tree; interfaces and native classes exist solely through their
/// interface-type record and their static-like namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    /// A regular (possibly abstract) class.
    Class,
    /// A module (singleton) class, accessed through a lazy accessor.
    ModuleClass,
    /// A class whose instances are represented by primitive target-language
    /// values. Treated as instance-carrying for hierarchy purposes.
    HijackedClass,
    /// An interface. Its public-instance slot holds default methods.
    Interface,
    /// A class provided by the target environment; passed through opaquely.
    NativeClass,
}

impl ClassKind {
    /// Whether classes of this kind become nodes in the class hierarchy
    /// tree rooted at the `Object` class.
    #[inline]
    #[must_use]
    pub const fn has_hierarchy_node(self) -> bool {
        matches!(
            self,
            ClassKind::Class | ClassKind::ModuleClass | ClassKind::HijackedClass
        )
    }

    /// Whether this kind designates a module (singleton) class.
    #[inline]
    #[must_use]
    pub const fn is_module_class(self) -> bool {
        matches!(self, ClassKind::ModuleClass)
    }

    /// Whether this kind designates an interface.
    #[inline]
    #[must_use]
    pub const fn is_interface(self) -> bool {
        matches!(self, ClassKind::Interface)
    }
}

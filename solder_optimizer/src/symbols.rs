//! Runtime facilities the optimizer's rewrites rely on.
//!
//! The emitted calls assume these symbols survive linking even when no
//! user code references them; the linker queries this set to preserve
//! them.

use solder_ir::{ClassName, MethodName};

/// One runtime symbol the optimizer requires the linker to preserve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolRequirement {
    /// Every method of the class must be preserved.
    AllMethodsOf {
        /// The required class.
        class: ClassName,
    },
    /// The class must stay instantiable through the given constructor.
    InstantiateClass {
        /// The required class.
        class: ClassName,
        /// The constructor that must be preserved.
        constructor: MethodName,
    },
}

/// The symbols required by the optimizer's rewrites: long arithmetic is
/// lowered through `RuntimeLong`, and elided null checks re-materialize
/// `NullPointerException` on the slow path.
#[must_use]
pub fn symbol_requirements() -> Vec<SymbolRequirement> {
    vec![
        SymbolRequirement::AllMethodsOf {
            class: ClassName::new("s_RuntimeLong"),
        },
        SymbolRequirement::InstantiateClass {
            class: ClassName::new("s_NullPointerException"),
            constructor: MethodName::no_arg_constructor(),
        },
    ]
}

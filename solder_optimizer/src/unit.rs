//! The linking unit: the input and output of one optimizer run.
//!
//! A linking unit is the complete batch of linked classes produced by the
//! base linker for one run, together with the core spec and the module
//! initializers, both of which the optimizer passes through untouched.

use solder_ir::{
    ClassHints, ClassKind, ClassName, FieldDef, MethodDef, MethodName, Versioned,
};
use std::sync::Arc;

/// Linker-wide configuration passed through the optimizer unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoreSpec {
    /// The module system the emitted code targets.
    pub module_kind: ModuleKind,
}

/// The module system of the emitted program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleKind {
    /// A single script with no module system.
    #[default]
    NoModule,
    /// ECMAScript modules.
    EsModule,
    /// CommonJS modules.
    CommonJs,
}

/// An entry point executed when its module loads.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleInitializer {
    /// The module class holding the entry point.
    pub class: ClassName,
    /// The static method to invoke.
    pub entry_point: MethodName,
    /// Arguments forwarded to the entry point.
    pub args: Vec<String>,
}

/// A class definition as delivered by the base linker.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedClass {
    /// The class's encoded name.
    pub name: ClassName,
    /// The kind of the class.
    pub kind: ClassKind,
    /// The immediate superclass; absent only for the `Object` root.
    pub super_class: Option<ClassName>,
    /// Flat ancestor set: this class plus all transitive superclasses and
    /// interfaces, by encoded name.
    pub ancestors: Vec<ClassName>,
    /// Whether the linker found any instantiation of this class.
    pub has_instances: bool,
    /// The current field list.
    pub fields: Vec<FieldDef>,
    /// All method definitions, across all member namespaces.
    pub methods: Vec<Versioned<Arc<MethodDef>>>,
    /// Frontend optimizer hints for the class.
    pub hints: ClassHints,
}

impl LinkedClass {
    /// Rebuild this class with the given optimized method definitions
    /// substituted in.
    #[must_use]
    pub fn optimized(&self, methods: Vec<Versioned<Arc<MethodDef>>>) -> LinkedClass {
        LinkedClass {
            name: self.name.clone(),
            kind: self.kind,
            super_class: self.super_class.clone(),
            ancestors: self.ancestors.clone(),
            has_instances: self.has_instances,
            fields: self.fields.clone(),
            methods,
            hints: self.hints,
        }
    }
}

/// The complete input (and output) of one optimizer run.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkingUnit {
    /// Linker-wide configuration, passed through.
    pub core_spec: CoreSpec,
    /// All linked classes, keyed by position; encoded names are unique.
    pub classes: Vec<LinkedClass>,
    /// Module entry points, passed through.
    pub module_initializers: Vec<ModuleInitializer>,
}

impl LinkingUnit {
    /// A unit with the given classes and defaults everywhere else.
    #[must_use]
    pub fn of_classes(classes: Vec<LinkedClass>) -> Self {
        Self {
            core_spec: CoreSpec::default(),
            classes,
            module_initializers: Vec::new(),
        }
    }
}

//! Shared linking-unit builders for the integration suites.

// Each integration binary compiles this module separately and uses a
// different subset of the builders.
#![allow(dead_code)]

use solder_ir::{
    ClassHints, ClassKind, ClassName, FieldDef, MemberNamespace, MethodDef, MethodName, Tree,
    Versioned,
};
use solder_optimizer::{IncOptimizer, LinkedClass, LinkingUnit, NullLogger};
use std::sync::Arc;

/// Wrap a definition with its content hash as the version stamp, the way
/// the frontend emitter does.
pub fn versioned(def: MethodDef) -> Versioned<Arc<MethodDef>> {
    let def = def.hashed();
    let version = def.hash.expect("hashed").to_hex();
    Versioned::new(version, Arc::new(def))
}

/// A concrete public-instance method.
pub fn instance_method(name: &str, body: Tree) -> Versioned<Arc<MethodDef>> {
    versioned(MethodDef::new(
        MethodName::new(name),
        MemberNamespace::PublicInstance,
        body,
    ))
}

/// The zero-argument constructor with the given body.
pub fn constructor(body: Tree) -> Versioned<Arc<MethodDef>> {
    versioned(MethodDef::new(
        MethodName::no_arg_constructor(),
        MemberNamespace::Constructor,
        body,
    ))
}

/// The `Object` root class.
pub fn object_class() -> LinkedClass {
    LinkedClass {
        name: ClassName::new("LObject"),
        kind: ClassKind::Class,
        super_class: None,
        ancestors: vec![ClassName::new("LObject")],
        has_instances: true,
        fields: Vec::new(),
        methods: Vec::new(),
        hints: ClassHints::default(),
    }
}

/// A regular class.
pub fn class(
    name: &str,
    super_class: &str,
    ancestors: &[&str],
    has_instances: bool,
    methods: Vec<Versioned<Arc<MethodDef>>>,
) -> LinkedClass {
    LinkedClass {
        name: ClassName::new(name),
        kind: ClassKind::Class,
        super_class: Some(ClassName::new(super_class)),
        ancestors: ancestors.iter().map(|a| ClassName::new(*a)).collect(),
        has_instances,
        fields: Vec::new(),
        methods,
        hints: ClassHints::default(),
    }
}

/// A module (singleton) class.
pub fn module_class(
    name: &str,
    super_class: &str,
    ancestors: &[&str],
    methods: Vec<Versioned<Arc<MethodDef>>>,
) -> LinkedClass {
    LinkedClass {
        kind: ClassKind::ModuleClass,
        has_instances: true,
        ..class(name, super_class, ancestors, true, methods)
    }
}

/// An interface.
pub fn interface(
    name: &str,
    ancestors: &[&str],
    methods: Vec<Versioned<Arc<MethodDef>>>,
) -> LinkedClass {
    LinkedClass {
        name: ClassName::new(name),
        kind: ClassKind::Interface,
        super_class: None,
        ancestors: ancestors.iter().map(|a| ClassName::new(*a)).collect(),
        has_instances: false,
        fields: Vec::new(),
        methods,
        hints: ClassHints::default(),
    }
}

/// Attach instance fields to a linked class.
pub fn with_fields(mut linked: LinkedClass, fields: Vec<FieldDef>) -> LinkedClass {
    linked.fields = fields;
    linked
}

/// Mark a class as an inlineable record class.
pub fn inlineable(mut linked: LinkedClass) -> LinkedClass {
    linked.hints.inline = true;
    linked
}

/// Run one update, panicking on operational errors.
pub fn run(optimizer: &mut IncOptimizer, unit: &LinkingUnit) -> LinkingUnit {
    optimizer
        .update(unit, Arc::new(NullLogger))
        .expect("update failed")
}

/// The output version stamp of one method in the optimized unit.
pub fn version_of(unit: &LinkingUnit, class: &str, method: &str) -> String {
    method_of(unit, class, method)
        .version
        .clone()
        .expect("optimized methods are versioned")
}

/// The optimized definition of one method in the optimized unit.
pub fn method_of<'a>(
    unit: &'a LinkingUnit,
    class: &str,
    method: &str,
) -> &'a Versioned<Arc<MethodDef>> {
    unit.classes
        .iter()
        .find(|c| c.name == *class)
        .unwrap_or_else(|| panic!("class {class} not in unit"))
        .methods
        .iter()
        .find(|m| m.value.name == *method)
        .unwrap_or_else(|| panic!("method {method} not on {class}"))
}

/// The optimized body of one method in the optimized unit.
pub fn body_of(unit: &LinkingUnit, class: &str, method: &str) -> Tree {
    method_of(unit, class, method)
        .value
        .body
        .clone()
        .expect("method has a body")
}

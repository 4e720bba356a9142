//! Batch-mode behavior: the first run of a fresh optimizer, determinism
//! across fresh optimizers, and idempotent re-runs.

mod common;

use common::*;
use solder_ir::{ClassName, LocalName, MemberNamespace, MethodName, Tree};
use solder_optimizer::{IncOptimizer, LinkingUnit, ModuleInitializer, OptimizerConfig};

fn hello_unit() -> LinkingUnit {
    let caller_body = Tree::Apply {
        receiver_type: ClassName::new("LA"),
        receiver: Box::new(Tree::VarRef(LocalName::new("a"))),
        method: MethodName::new("m__I"),
        args: vec![],
    };
    let mut unit = LinkingUnit::of_classes(vec![
        object_class(),
        class(
            "LA",
            "LObject",
            &["LA", "LObject"],
            false,
            vec![instance_method(
                "m__I",
                Tree::Literal(solder_ir::Literal::Int(42)),
            )],
        ),
        class("LB", "LA", &["LB", "LA", "LObject"], true, vec![]),
        class(
            "LCaller",
            "LObject",
            &["LCaller", "LObject"],
            true,
            vec![instance_method("f__I", caller_body)],
        ),
    ]);
    unit.module_initializers.push(ModuleInitializer {
        class: ClassName::new("LCaller"),
        entry_point: MethodName::new("main__V"),
        args: vec![],
    });
    unit
}

// =============================================================================
// Hello Batch
// =============================================================================

#[test]
fn test_every_method_optimized_exactly_once() {
    let mut opt = IncOptimizer::default();
    let out = run(&mut opt, &hello_unit());

    // First processing of each method emits output version 1.
    assert_eq!(version_of(&out, "LA", "m__I"), "1");
    assert_eq!(version_of(&out, "LCaller", "f__I"), "1");
    assert_eq!(opt.stats().methods_processed, 2);
    assert_eq!(opt.stats().runs, 1);
}

#[test]
fn test_single_target_call_devirtualizes_through_inheritance() {
    // B is the only instantiated subclass of A and inherits m, so the
    // virtual call in the caller resolves to exactly one target and
    // becomes statically bound to A.
    let mut opt = IncOptimizer::default();
    let out = run(&mut opt, &hello_unit());

    match body_of(&out, "LCaller", "f__I") {
        Tree::ApplyStatically {
            class,
            namespace,
            method,
            ..
        } => {
            assert_eq!(class, "LA");
            assert_eq!(namespace, MemberNamespace::PublicInstance);
            assert_eq!(method, "m__I");
        }
        other => panic!("expected a devirtualized call, got {other:?}"),
    }
}

#[test]
fn test_output_shape_mirrors_input() {
    let mut opt = IncOptimizer::default();
    let unit = hello_unit();
    let out = run(&mut opt, &unit);

    assert_eq!(out.classes.len(), unit.classes.len());
    for (input, output) in unit.classes.iter().zip(&out.classes) {
        assert_eq!(input.name, output.name);
        assert_eq!(input.ancestors, output.ancestors);
        let input_names: Vec<_> = input.methods.iter().map(|m| &m.value.name).collect();
        let output_names: Vec<_> = output.methods.iter().map(|m| &m.value.name).collect();
        assert_eq!(input_names, output_names);
    }
    assert_eq!(out.module_initializers, unit.module_initializers);
    assert_eq!(out.core_spec, unit.core_spec);
}

// =============================================================================
// Determinism & Idempotence
// =============================================================================

#[test]
fn test_fresh_optimizers_agree() {
    let unit = hello_unit();
    let mut first = IncOptimizer::new(OptimizerConfig::sequential());
    let mut second = IncOptimizer::new(OptimizerConfig::default());

    let out_first = run(&mut first, &unit);
    let out_second = run(&mut second, &unit);
    assert_eq!(out_first, out_second);
}

#[test]
fn test_identical_rerun_is_free() {
    let unit = hello_unit();
    let mut opt = IncOptimizer::default();
    let first = run(&mut opt, &unit);
    let processed = opt.stats().methods_processed;

    let second = run(&mut opt, &unit);
    assert_eq!(first, second);
    assert_eq!(opt.stats().methods_processed, processed);
    assert_eq!(opt.stats().methods_deleted, 0);
    assert_eq!(opt.stats().classes_removed, 0);
}

#[test]
fn test_batch_then_noop_then_noop() {
    let unit = hello_unit();
    let mut opt = IncOptimizer::default();
    let first = run(&mut opt, &unit);
    let second = run(&mut opt, &unit);
    let third = run(&mut opt, &unit);

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(opt.stats().runs, 3);
}

// =============================================================================
// Stats agreement
// =============================================================================

#[test]
fn test_processed_count_matches_version_movement() {
    let unit = hello_unit();
    let mut opt = IncOptimizer::default();
    let out = run(&mut opt, &unit);

    let bumped = out
        .classes
        .iter()
        .flat_map(|c| &c.methods)
        .filter(|m| m.version.is_some())
        .count() as u64;
    assert_eq!(opt.stats().methods_processed, bumped);
}

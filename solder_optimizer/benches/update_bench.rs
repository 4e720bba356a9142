//! Benchmarks of repeated `update` calls: batch cost and the incremental
//! no-op cost that every watch-mode rebuild pays.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use solder_ir::{
    ClassHints, ClassKind, ClassName, Literal, LocalName, MemberNamespace, MethodDef, MethodName,
    Tree, Versioned,
};
use solder_optimizer::{IncOptimizer, LinkedClass, LinkingUnit, NullLogger, OptimizerConfig};
use std::sync::Arc;

fn method(name: &str, body: Tree) -> Versioned<Arc<MethodDef>> {
    let def = MethodDef::new(MethodName::new(name), MemberNamespace::PublicInstance, body).hashed();
    let version = def.hash.expect("hashed").to_hex();
    Versioned::new(version, Arc::new(def))
}

/// A unit of `width` sibling classes under one base, each with a few
/// methods and a caller into the shared base method.
fn synthetic_unit(width: usize) -> LinkingUnit {
    let mut classes = vec![
        LinkedClass {
            name: ClassName::new("LObject"),
            kind: ClassKind::Class,
            super_class: None,
            ancestors: vec![ClassName::new("LObject")],
            has_instances: true,
            fields: Vec::new(),
            methods: Vec::new(),
            hints: ClassHints::default(),
        },
        LinkedClass {
            name: ClassName::new("LBase"),
            kind: ClassKind::Class,
            super_class: Some(ClassName::new("LObject")),
            ancestors: vec![ClassName::new("LBase"), ClassName::new("LObject")],
            has_instances: false,
            fields: Vec::new(),
            methods: vec![method("shared__V", Tree::Skip)],
            hints: ClassHints::default(),
        },
    ];
    for i in 0..width {
        let name = format!("LSub{i}");
        classes.push(LinkedClass {
            name: ClassName::new(name.as_str()),
            kind: ClassKind::Class,
            super_class: Some(ClassName::new("LBase")),
            ancestors: vec![
                ClassName::new(name.as_str()),
                ClassName::new("LBase"),
                ClassName::new("LObject"),
            ],
            has_instances: true,
            fields: Vec::new(),
            methods: vec![
                method(
                    &format!("own{i}__I"),
                    Tree::Literal(Literal::Int(i as i32)),
                ),
                method(
                    &format!("call{i}__V"),
                    Tree::Apply {
                        receiver_type: ClassName::new("LBase"),
                        receiver: Box::new(Tree::VarRef(LocalName::new("x"))),
                        method: MethodName::new("shared__V"),
                        args: vec![],
                    },
                ),
            ],
            hints: ClassHints::default(),
        });
    }
    LinkingUnit::of_classes(classes)
}

fn bench_batch(c: &mut Criterion) {
    let unit = synthetic_unit(100);
    c.bench_function("batch_100_classes", |b| {
        b.iter_batched(
            || IncOptimizer::new(OptimizerConfig::sequential()),
            |mut opt| {
                opt.update(&unit, Arc::new(NullLogger)).expect("update failed");
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_incremental_noop(c: &mut Criterion) {
    let unit = synthetic_unit(100);
    c.bench_function("incremental_noop_100_classes", |b| {
        b.iter_batched(
            || {
                let mut opt = IncOptimizer::new(OptimizerConfig::sequential());
                opt.update(&unit, Arc::new(NullLogger)).expect("update failed");
                opt
            },
            |mut opt| {
                opt.update(&unit, Arc::new(NullLogger)).expect("update failed");
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_batch, bench_incremental_noop);
criterion_main!(benches);

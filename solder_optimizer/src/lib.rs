//! # Solder Incremental Optimizer
//!
//! The incremental whole-program method optimizer of the Solder linker.
//! It accepts a linking unit, a batch of class definitions with their
//! methods, and produces an equivalent unit in which each method body has
//! been replaced by an optimized version.
//!
//! Across successive runs driven by edited source, only the method
//! optimizations whose inputs changed are recomputed; reuse of all others
//! is proven through the dependency-tracking substrate:
//!
//! - **Class hierarchy**: the tree of instantiable classes rooted at the
//!   `Object` class
//! - **Static-like namespaces**: per-class containers for constructors,
//!   statics and interface default methods
//! - **Interface-type index**: per-name records holding ancestor lists,
//!   instantiated subclasses and the caller-dependency tables
//! - **Method implementations**: per-method input/output versions, the
//!   one-shot tag bit and the subscription sweep
//! - **Pass orchestration**: the two-phase `update` protocol (UPDATE PASS
//!   reconciles and tags, PROCESS PASS reoptimizes in parallel)
//!
//! # Example
//!
//! ```
//! use solder_optimizer::{IncOptimizer, LinkingUnit, NullLogger, OptimizerConfig};
//! use std::sync::Arc;
//!
//! let mut optimizer = IncOptimizer::new(OptimizerConfig::default());
//! let unit = LinkingUnit::of_classes(vec![/* linked classes */]);
//! # let unit = {
//! #     let mut unit = unit;
//! #     unit.classes.push(solder_optimizer::LinkedClass {
//! #         name: solder_ir::ClassName::new("LObject"),
//! #         kind: solder_ir::ClassKind::Class,
//! #         super_class: None,
//! #         ancestors: vec![solder_ir::ClassName::new("LObject")],
//! #         has_instances: true,
//! #         fields: Vec::new(),
//! #         methods: Vec::new(),
//! #         hints: Default::default(),
//! #     });
//! #     unit
//! # };
//! let optimized = optimizer.update(&unit, Arc::new(NullLogger)).unwrap();
//! assert_eq!(optimized.classes.len(), unit.classes.len());
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod collops;
mod container;
mod hierarchy;
mod interfaces;
mod namespace;

pub mod core;
pub mod error;
pub mod method;
pub mod optimizer;
pub mod symbols;
pub mod unit;

pub use crate::core::{OptimizerCore, OptimizerHooks};
pub use crate::error::{OptimizeError, OptimizeResult};
pub use crate::method::{MethodAttributes, MethodImpl};
pub use crate::optimizer::{
    IncOptimizer, Logger, NullLogger, OptimizerConfig, OptimizerStats, StatsSnapshot,
};
pub use crate::symbols::{symbol_requirements, SymbolRequirement};
pub use crate::unit::{
    CoreSpec, LinkedClass, LinkingUnit, ModuleInitializer, ModuleKind,
};

/// Solder incremental optimizer version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

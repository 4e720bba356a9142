//! # Solder IR
//!
//! The intermediate representation surface of the Solder whole-program
//! linker: a class-based, nominally-typed IR compiled down to the target
//! language by the later stages of the pipeline.
//!
//! This crate provides the foundational building blocks shared across all
//! Solder components:
//!
//! - **Encoded Names**: stable string identities for classes, methods and
//!   fields, cheap to clone and to key maps with
//! - **Trees**: the statement/expression forms of method bodies
//! - **Types**: the nominal type lattice and per-type zero values
//! - **Hashing**: structural content hashes of method definitions
//! - **Versioning**: version stamps used to detect unchanged inputs

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod class_kind;
pub mod hashing;
pub mod names;
pub mod trees;
pub mod types;
pub mod version;

pub use class_kind::ClassKind;
pub use hashing::TreeHash;
pub use names::{ClassName, FieldName, LocalName, MethodName};
pub use trees::{
    ClassHints, FieldDef, Literal, MemberNamespace, MethodDef, MethodFlags, MethodHints, Tree,
};
pub use types::{RecordField, RecordType, Type};
pub use version::Versioned;

/// Solder IR version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

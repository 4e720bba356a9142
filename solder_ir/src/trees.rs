//! Trees: the body forms of methods, and the member definitions that carry
//! them.
//!
//! The tree language is deliberately small. It covers exactly what the
//! method optimizer needs to observe: control and sequencing (`Block`,
//! `If`, `Skip`), leaf expressions, field stores on `this`, module storage
//! and access, the three call forms, allocation, record values and
//! instance tests.
//!
//! Dynamic calls and instance tests carry the *static type* of their
//! receiver/scrutinee in the node itself; the optimizer has no typer of its
//! own to recover it.

use crate::names::{ClassName, FieldName, LocalName, MethodName};
use crate::types::{RecordType, Type};
use crate::TreeHash;

// =============================================================================
// Member Namespaces
// =============================================================================

/// The namespace a member definition lives in.
///
/// The ordinal is total and dense; static-like method containers are
/// allocated as arrays of [`MemberNamespace::COUNT`] indexed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MemberNamespace {
    /// Public instance methods. On interfaces these are default methods;
    /// on classes they live on the hierarchy node, not in the static-like
    /// namespaces.
    PublicInstance = 0,
    /// Private instance methods (interfaces only).
    PrivateInstance = 1,
    /// Public static methods.
    PublicStatic = 2,
    /// Private static methods.
    PrivateStatic = 3,
    /// Instance constructors.
    Constructor = 4,
    /// The static (class) initializer.
    StaticConstructor = 5,
}

impl MemberNamespace {
    /// Number of namespaces; the size of every dense namespace array.
    pub const COUNT: usize = 6;

    /// All namespaces, in ordinal order.
    pub const ALL: [MemberNamespace; MemberNamespace::COUNT] = [
        MemberNamespace::PublicInstance,
        MemberNamespace::PrivateInstance,
        MemberNamespace::PublicStatic,
        MemberNamespace::PrivateStatic,
        MemberNamespace::Constructor,
        MemberNamespace::StaticConstructor,
    ];

    /// The dense ordinal of this namespace, usable as an array index.
    #[inline]
    #[must_use]
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    /// Whether members of this namespace are invoked without a receiver.
    #[inline]
    #[must_use]
    pub const fn is_static(self) -> bool {
        matches!(
            self,
            MemberNamespace::PublicStatic
                | MemberNamespace::PrivateStatic
                | MemberNamespace::StaticConstructor
        )
    }

    /// Whether members of this namespace are constructors.
    #[inline]
    #[must_use]
    pub const fn is_constructor(self) -> bool {
        matches!(
            self,
            MemberNamespace::Constructor | MemberNamespace::StaticConstructor
        )
    }
}

/// Flags attached to a method definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodFlags {
    /// The namespace the method lives in.
    pub namespace: MemberNamespace,
    /// Whether the method is a constructor.
    pub is_constructor: bool,
}

impl MethodFlags {
    /// Flags for a plain member of `namespace`.
    #[inline]
    #[must_use]
    pub const fn of(namespace: MemberNamespace) -> Self {
        Self {
            namespace,
            is_constructor: namespace.is_constructor(),
        }
    }
}

// =============================================================================
// Optimizer Hints
// =============================================================================

/// Per-method hints emitted by the compiler frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MethodHints {
    /// The frontend asks for this method to be inlined when possible.
    pub inline: bool,
    /// The frontend forbids inlining this method.
    pub no_inline: bool,
}

/// Per-class hints emitted by the compiler frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClassHints {
    /// The class is a record-like value class whose allocations may be
    /// replaced by flat record values.
    pub inline: bool,
}

// =============================================================================
// Literals
// =============================================================================

/// A literal constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// The unit value.
    Unit,
    /// The null reference.
    Null,
    /// A boolean.
    Bool(bool),
    /// A character.
    Char(char),
    /// A 32-bit integer.
    Int(i32),
    /// A 64-bit integer.
    Long(i64),
    /// A 64-bit float.
    Double(f64),
    /// A string constant.
    Str(String),
}

// =============================================================================
// Trees
// =============================================================================

/// A statement or expression of a method body.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    /// The empty statement.
    Skip,
    /// A sequence of statements evaluated in order.
    Block(Vec<Tree>),
    /// A literal constant.
    Literal(Literal),
    /// A reference to a local binding.
    VarRef(LocalName),
    /// The receiver of the enclosing instance method.
    This,
    /// A field selection.
    Select {
        /// The object the field is read from.
        qualifier: Box<Tree>,
        /// The selected field.
        field: FieldName,
    },
    /// An assignment. The left-hand side is a `VarRef` or a `Select`.
    Assign {
        /// Assignment target.
        lhs: Box<Tree>,
        /// Assigned value.
        rhs: Box<Tree>,
    },
    /// A two-armed conditional.
    If {
        /// Condition.
        cond: Box<Tree>,
        /// Branch taken when the condition is true.
        thenp: Box<Tree>,
        /// Branch taken when the condition is false.
        elsep: Box<Tree>,
    },
    /// Publication of `value` as the module instance of `class`.
    StoreModule {
        /// The module class being initialized.
        class: ClassName,
        /// The instance to publish, typically `This`.
        value: Box<Tree>,
    },
    /// Access to the module instance of `class`.
    LoadModule {
        /// The module class being accessed.
        class: ClassName,
        /// When true, the access skips the lazy-initialization check. Set
        /// by the optimizer for modules with an elidable accessor.
        direct: bool,
    },
    /// A virtual (dynamically dispatched) method call.
    Apply {
        /// The static type of the receiver, as an encoded class name.
        receiver_type: ClassName,
        /// The receiver expression.
        receiver: Box<Tree>,
        /// The invoked method.
        method: MethodName,
        /// Argument expressions.
        args: Vec<Tree>,
    },
    /// A statically bound method call.
    ApplyStatically {
        /// The class owning the call target.
        class: ClassName,
        /// The namespace the target lives in.
        namespace: MemberNamespace,
        /// The invoked method.
        method: MethodName,
        /// The receiver, absent for static namespaces.
        receiver: Option<Box<Tree>>,
        /// Argument expressions.
        args: Vec<Tree>,
    },
    /// Allocation of a new instance, running the given constructor.
    New {
        /// The instantiated class.
        class: ClassName,
        /// The constructor to run.
        ctor: MethodName,
        /// Constructor arguments.
        args: Vec<Tree>,
    },
    /// A flat record value.
    RecordValue {
        /// The record type.
        record: RecordType,
        /// One expression per record field, in field order.
        fields: Vec<Tree>,
    },
    /// A nominal instance test.
    IsInstanceOf {
        /// The tested expression.
        expr: Box<Tree>,
        /// The static type of the tested expression.
        expr_type: ClassName,
        /// The type tested against.
        test: ClassName,
    },
}

impl Tree {
    /// The unit literal.
    #[inline]
    #[must_use]
    pub fn unit() -> Tree {
        Tree::Literal(Literal::Unit)
    }

    /// Whether evaluating this tree can have no observable effect.
    ///
    /// Only leaves qualify; anything that reads a field, loads a module or
    /// calls code does not.
    #[must_use]
    pub fn is_trivially_pure(&self) -> bool {
        matches!(
            self,
            Tree::Skip | Tree::Literal(_) | Tree::VarRef(_) | Tree::This
        )
    }

    /// Number of nodes in this tree. Used by inlineability heuristics.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Tree::Skip | Tree::Literal(_) | Tree::VarRef(_) | Tree::This => 1,
            Tree::Block(stats) => 1 + stats.iter().map(Tree::size).sum::<usize>(),
            Tree::Select { qualifier, .. } => 1 + qualifier.size(),
            Tree::Assign { lhs, rhs } => 1 + lhs.size() + rhs.size(),
            Tree::If { cond, thenp, elsep } => 1 + cond.size() + thenp.size() + elsep.size(),
            Tree::StoreModule { value, .. } => 1 + value.size(),
            Tree::LoadModule { .. } => 1,
            Tree::Apply { receiver, args, .. } => {
                1 + receiver.size() + args.iter().map(Tree::size).sum::<usize>()
            }
            Tree::ApplyStatically { receiver, args, .. } => {
                1 + receiver.as_ref().map_or(0, |r| r.size())
                    + args.iter().map(Tree::size).sum::<usize>()
            }
            Tree::New { args, .. } => 1 + args.iter().map(Tree::size).sum::<usize>(),
            Tree::RecordValue { fields, .. } => {
                1 + fields.iter().map(Tree::size).sum::<usize>()
            }
            Tree::IsInstanceOf { expr, .. } => 1 + expr.size(),
        }
    }
}

// =============================================================================
// Member Definitions
// =============================================================================

/// A method definition as delivered by the linker frontend.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    /// The method's encoded name.
    pub name: MethodName,
    /// Namespace and constructor-ness.
    pub flags: MethodFlags,
    /// Frontend optimizer hints.
    pub hints: MethodHints,
    /// Structural content hash of this definition, when the frontend
    /// computed one. Definitions with equal hashes are identical for all
    /// incremental purposes.
    pub hash: Option<TreeHash>,
    /// The body; absent for abstract methods.
    pub body: Option<Tree>,
}

impl MethodDef {
    /// A concrete method definition with no hints and no hash.
    #[must_use]
    pub fn new(name: MethodName, namespace: MemberNamespace, body: Tree) -> Self {
        Self {
            name,
            flags: MethodFlags::of(namespace),
            hints: MethodHints::default(),
            hash: None,
            body: Some(body),
        }
    }

    /// This definition with its content hash filled in.
    #[must_use]
    pub fn hashed(mut self) -> Self {
        self.hash = Some(crate::hashing::hash_method_def(&self));
        self
    }
}

/// A field definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// The field's encoded name.
    pub name: FieldName,
    /// The declared type.
    pub tpe: Type,
    /// Whether the field is static.
    pub is_static: bool,
}

impl FieldDef {
    /// An instance field of the given type.
    #[must_use]
    pub fn instance(name: impl Into<FieldName>, tpe: Type) -> Self {
        Self {
            name: name.into(),
            tpe,
            is_static: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Namespace Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_ordinals_are_dense() {
        for (i, ns) in MemberNamespace::ALL.iter().enumerate() {
            assert_eq!(ns.ordinal(), i);
        }
    }

    #[test]
    fn test_static_and_constructor_partition() {
        assert!(MemberNamespace::PublicStatic.is_static());
        assert!(MemberNamespace::StaticConstructor.is_static());
        assert!(!MemberNamespace::Constructor.is_static());
        assert!(MemberNamespace::Constructor.is_constructor());
        assert!(!MemberNamespace::PublicInstance.is_constructor());
    }

    // -------------------------------------------------------------------------
    // Tree Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_trivially_pure_leaves() {
        assert!(Tree::Skip.is_trivially_pure());
        assert!(Tree::This.is_trivially_pure());
        assert!(Tree::unit().is_trivially_pure());
        assert!(Tree::VarRef(LocalName::new("x")).is_trivially_pure());
        assert!(!Tree::LoadModule {
            class: ClassName::new("M"),
            direct: false,
        }
        .is_trivially_pure());
    }

    #[test]
    fn test_size_counts_nodes() {
        let tree = Tree::Block(vec![
            Tree::Skip,
            Tree::Assign {
                lhs: Box::new(Tree::Select {
                    qualifier: Box::new(Tree::This),
                    field: FieldName::new("x"),
                }),
                rhs: Box::new(Tree::Literal(Literal::Int(1))),
            },
        ]);
        assert_eq!(tree.size(), 6);
    }
}

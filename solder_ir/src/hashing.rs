//! Structural content hashing of method definitions.
//!
//! The hash covers everything the optimizer observes about a definition:
//! name, flags, hints and the full body structure. Two definitions with
//! equal hashes are interchangeable for all incremental purposes; the
//! incremental optimizer treats the hash as authoritative even when the
//! surrounding version stamp differs.

use crate::names::{ClassName, FieldName, LocalName, MethodName};
use crate::trees::{Literal, MethodDef, Tree};
use crate::types::{RecordType, Type};
use std::fmt;

/// A structural hash of a method definition.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeHash([u8; 32]);

impl TreeHash {
    /// The raw digest bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The digest as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

impl fmt::Debug for TreeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreeHash({})", &self.to_hex()[..16])
    }
}

/// Hash a method definition structurally.
///
/// The `hash` field of the definition itself is not part of the digest.
#[must_use]
pub fn hash_method_def(def: &MethodDef) -> TreeHash {
    let mut hasher = blake3::Hasher::new();
    feed_method_name(&mut hasher, &def.name);
    hasher.update(&[
        def.flags.namespace.ordinal() as u8,
        u8::from(def.flags.is_constructor),
        u8::from(def.hints.inline),
        u8::from(def.hints.no_inline),
    ]);
    match &def.body {
        None => {
            hasher.update(&[0]);
        }
        Some(body) => {
            hasher.update(&[1]);
            feed_tree(&mut hasher, body);
        }
    }
    TreeHash(*hasher.finalize().as_bytes())
}

fn feed_str(hasher: &mut blake3::Hasher, s: &str) {
    hasher.update(&(s.len() as u32).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn feed_class_name(hasher: &mut blake3::Hasher, name: &ClassName) {
    feed_str(hasher, name.as_str());
}

fn feed_method_name(hasher: &mut blake3::Hasher, name: &MethodName) {
    feed_str(hasher, name.as_str());
}

fn feed_field_name(hasher: &mut blake3::Hasher, name: &FieldName) {
    feed_str(hasher, name.as_str());
}

fn feed_local_name(hasher: &mut blake3::Hasher, name: &LocalName) {
    feed_str(hasher, name.as_str());
}

fn feed_literal(hasher: &mut blake3::Hasher, literal: &Literal) {
    match literal {
        Literal::Unit => {
            hasher.update(&[0]);
        }
        Literal::Null => {
            hasher.update(&[1]);
        }
        Literal::Bool(b) => {
            hasher.update(&[2, u8::from(*b)]);
        }
        Literal::Char(c) => {
            hasher.update(&[3]);
            hasher.update(&(*c as u32).to_le_bytes());
        }
        Literal::Int(i) => {
            hasher.update(&[4]);
            hasher.update(&i.to_le_bytes());
        }
        Literal::Long(l) => {
            hasher.update(&[5]);
            hasher.update(&l.to_le_bytes());
        }
        Literal::Double(d) => {
            hasher.update(&[6]);
            hasher.update(&d.to_bits().to_le_bytes());
        }
        Literal::Str(s) => {
            hasher.update(&[7]);
            feed_str(hasher, s);
        }
    }
}

fn feed_type(hasher: &mut blake3::Hasher, tpe: &Type) {
    match tpe {
        Type::Any => {
            hasher.update(&[0]);
        }
        Type::Unit => {
            hasher.update(&[1]);
        }
        Type::Boolean => {
            hasher.update(&[2]);
        }
        Type::Char => {
            hasher.update(&[3]);
        }
        Type::Int => {
            hasher.update(&[4]);
        }
        Type::Long => {
            hasher.update(&[5]);
        }
        Type::Double => {
            hasher.update(&[6]);
        }
        Type::StringType => {
            hasher.update(&[7]);
        }
        Type::Class(name) => {
            hasher.update(&[8]);
            feed_class_name(hasher, name);
        }
        Type::Record(record) => {
            hasher.update(&[9]);
            feed_record_type(hasher, record);
        }
    }
}

fn feed_record_type(hasher: &mut blake3::Hasher, record: &RecordType) {
    hasher.update(&(record.fields.len() as u32).to_le_bytes());
    for field in &record.fields {
        feed_field_name(hasher, &field.name);
        feed_type(hasher, &field.tpe);
    }
}

fn feed_trees(hasher: &mut blake3::Hasher, trees: &[Tree]) {
    hasher.update(&(trees.len() as u32).to_le_bytes());
    for tree in trees {
        feed_tree(hasher, tree);
    }
}

fn feed_tree(hasher: &mut blake3::Hasher, tree: &Tree) {
    match tree {
        Tree::Skip => {
            hasher.update(&[0]);
        }
        Tree::Block(stats) => {
            hasher.update(&[1]);
            feed_trees(hasher, stats);
        }
        Tree::Literal(literal) => {
            hasher.update(&[2]);
            feed_literal(hasher, literal);
        }
        Tree::VarRef(name) => {
            hasher.update(&[3]);
            feed_local_name(hasher, name);
        }
        Tree::This => {
            hasher.update(&[4]);
        }
        Tree::Select { qualifier, field } => {
            hasher.update(&[5]);
            feed_tree(hasher, qualifier);
            feed_field_name(hasher, field);
        }
        Tree::Assign { lhs, rhs } => {
            hasher.update(&[6]);
            feed_tree(hasher, lhs);
            feed_tree(hasher, rhs);
        }
        Tree::If { cond, thenp, elsep } => {
            hasher.update(&[7]);
            feed_tree(hasher, cond);
            feed_tree(hasher, thenp);
            feed_tree(hasher, elsep);
        }
        Tree::StoreModule { class, value } => {
            hasher.update(&[8]);
            feed_class_name(hasher, class);
            feed_tree(hasher, value);
        }
        Tree::LoadModule { class, direct } => {
            hasher.update(&[9, u8::from(*direct)]);
            feed_class_name(hasher, class);
        }
        Tree::Apply {
            receiver_type,
            receiver,
            method,
            args,
        } => {
            hasher.update(&[10]);
            feed_class_name(hasher, receiver_type);
            feed_tree(hasher, receiver);
            feed_method_name(hasher, method);
            feed_trees(hasher, args);
        }
        Tree::ApplyStatically {
            class,
            namespace,
            method,
            receiver,
            args,
        } => {
            hasher.update(&[11, namespace.ordinal() as u8]);
            feed_class_name(hasher, class);
            feed_method_name(hasher, method);
            match receiver {
                None => {
                    hasher.update(&[0]);
                }
                Some(receiver) => {
                    hasher.update(&[1]);
                    feed_tree(hasher, receiver);
                }
            }
            feed_trees(hasher, args);
        }
        Tree::New { class, ctor, args } => {
            hasher.update(&[12]);
            feed_class_name(hasher, class);
            feed_method_name(hasher, ctor);
            feed_trees(hasher, args);
        }
        Tree::RecordValue { record, fields } => {
            hasher.update(&[13]);
            feed_record_type(hasher, record);
            feed_trees(hasher, fields);
        }
        Tree::IsInstanceOf {
            expr,
            expr_type,
            test,
        } => {
            hasher.update(&[14]);
            feed_tree(hasher, expr);
            feed_class_name(hasher, expr_type);
            feed_class_name(hasher, test);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trees::MemberNamespace;

    fn def(body: Tree) -> MethodDef {
        MethodDef::new(
            MethodName::new("m__V"),
            MemberNamespace::PublicInstance,
            body,
        )
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = hash_method_def(&def(Tree::Skip));
        let b = hash_method_def(&def(Tree::Skip));
        assert_eq!(a, b);
    }

    #[test]
    fn test_body_change_changes_hash() {
        let a = hash_method_def(&def(Tree::Skip));
        let b = hash_method_def(&def(Tree::unit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_name_is_part_of_hash() {
        let a = hash_method_def(&def(Tree::Skip));
        let mut other = def(Tree::Skip);
        other.name = MethodName::new("n__V");
        assert_ne!(a, hash_method_def(&other));
    }

    #[test]
    fn test_hex_digest_length() {
        assert_eq!(hash_method_def(&def(Tree::Skip)).to_hex().len(), 64);
    }
}

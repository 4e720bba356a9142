//! The nominal type lattice and per-type zero values.

use crate::names::{ClassName, FieldName};
use crate::trees::{Literal, Tree};

/// A type as seen by the optimizer.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// The top type.
    Any,
    /// The unit type.
    Unit,
    /// Booleans.
    Boolean,
    /// Characters.
    Char,
    /// 32-bit integers.
    Int,
    /// 64-bit integers.
    Long,
    /// 64-bit floats.
    Double,
    /// Strings.
    StringType,
    /// Instances of the named class, or null.
    Class(ClassName),
    /// A flat record type. Records never appear in frontend input; they
    /// are synthesized by the optimizer for inlineable record classes.
    Record(RecordType),
}

impl Type {
    /// The zero value of this type, as a literal tree.
    ///
    /// Reference-like types zero to `Null`, numeric types to their zero,
    /// records to a record value of zeroed fields.
    #[must_use]
    pub fn zero_of(&self) -> Tree {
        match self {
            Type::Any | Type::StringType | Type::Class(_) => Tree::Literal(Literal::Null),
            Type::Unit => Tree::Literal(Literal::Unit),
            Type::Boolean => Tree::Literal(Literal::Bool(false)),
            Type::Char => Tree::Literal(Literal::Char('\u{0}')),
            Type::Int => Tree::Literal(Literal::Int(0)),
            Type::Long => Tree::Literal(Literal::Long(0)),
            Type::Double => Tree::Literal(Literal::Double(0.0)),
            Type::Record(record) => record.zero_value(),
        }
    }
}

/// A flat record type: an ordered list of named, typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    /// The record's fields, in declaration order.
    pub fields: Vec<RecordField>,
}

/// One field of a [`RecordType`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    /// The field's encoded name.
    pub name: FieldName,
    /// The field's type.
    pub tpe: Type,
}

impl RecordType {
    /// The record value with every field set to its type's zero.
    #[must_use]
    pub fn zero_value(&self) -> Tree {
        Tree::RecordValue {
            record: self.clone(),
            fields: self.fields.iter().map(|f| f.tpe.zero_of()).collect(),
        }
    }
}

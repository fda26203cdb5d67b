use std::{fmt, sync::Arc};

use crate::{
    program::ScalarType,
    runtime::{error::RuntimeError, gc::word_link},
};

/// Value produced while evaluating an expression.
///
/// Only scalars ever reach memory. Strings exist for `println` and builtin
/// arguments and cannot be stored.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Arc<str>),
    /// Address of a heap slot.
    Pointer(u64),
    /// Tagged link word naming a sub-heap.
    Link(u64),
    Null,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Bool(_) => "Bool",
            Value::Str(_) => "String",
            Value::Pointer(_) => "Pointer",
            Value::Link(_) => "Link",
            Value::Null => "Null",
        }
    }

    /// Encodes the value as a memory word of type `ty`.
    pub fn to_word(&self, ty: ScalarType) -> Result<u64, RuntimeError> {
        let word = match (ty, self) {
            (ScalarType::Int, Value::Int(v)) => *v as u64,
            (ScalarType::Float, Value::Float(v)) => v.to_bits(),
            (ScalarType::Float, Value::Int(v)) => (*v as f64).to_bits(),
            (ScalarType::Bool, Value::Bool(v)) => *v as u64,
            (ScalarType::Pointer, Value::Pointer(address)) => *address,
            (ScalarType::Link, Value::Link(word)) => *word,
            (ScalarType::Pointer | ScalarType::Link, Value::Null) => 0,
            (_, other) => {
                return Err(RuntimeError::TypeMismatch {
                    expected: ty.name(),
                    found: other.type_name(),
                });
            }
        };
        Ok(word)
    }

    /// Decodes a memory word read as type `ty`.
    pub fn from_word(word: u64, ty: ScalarType) -> Self {
        match ty {
            ScalarType::Int => Value::Int(word as i64),
            ScalarType::Float => Value::Float(f64::from_bits(word)),
            ScalarType::Bool => Value::Bool(word != 0),
            ScalarType::Pointer if word == 0 => Value::Null,
            ScalarType::Pointer => Value::Pointer(word),
            ScalarType::Link if word_link(word).is_none() => Value::Null,
            ScalarType::Link => Value::Link(word),
        }
    }

    pub fn as_int(&self) -> Result<i64, RuntimeError> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(RuntimeError::TypeMismatch {
                expected: "Int",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_bool(&self) -> Result<bool, RuntimeError> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(RuntimeError::TypeMismatch {
                expected: "Bool",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_pointer(&self) -> Result<u64, RuntimeError> {
        match self {
            Value::Pointer(address) => Ok(*address),
            other => Err(RuntimeError::TypeMismatch {
                expected: "Pointer",
                found: other.type_name(),
            }),
        }
    }

    /// Whether the value fits a parameter of type `ty`.
    pub fn matches(&self, ty: ScalarType) -> bool {
        self.to_word(ty).is_ok()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Pointer(address) => write!(f, "{:#x}", address),
            Value::Link(word) => match word_link(*word) {
                Some(id) => write!(f, "<link {}>", id),
                None => write!(f, "null"),
            },
            Value::Null => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::gc::link_word;

    #[test]
    fn scalars_survive_their_own_type() {
        let word = Value::Int(-7).to_word(ScalarType::Int).unwrap();
        assert_eq!(Value::from_word(word, ScalarType::Int), Value::Int(-7));

        let word = Value::Float(2.5).to_word(ScalarType::Float).unwrap();
        assert_eq!(Value::from_word(word, ScalarType::Float), Value::Float(2.5));

        let word = Value::Int(3).to_word(ScalarType::Float).unwrap();
        assert_eq!(Value::from_word(word, ScalarType::Float), Value::Float(3.0));
    }

    #[test]
    fn null_encodes_as_zero_pointer_and_link() {
        assert_eq!(Value::Null.to_word(ScalarType::Pointer).unwrap(), 0);
        assert_eq!(Value::from_word(0, ScalarType::Link), Value::Null);
        assert_eq!(
            Value::from_word(link_word(4), ScalarType::Link),
            Value::Link(link_word(4))
        );
    }

    #[test]
    fn strings_cannot_be_stored() {
        let err = Value::Str("hi".into()).to_word(ScalarType::Int).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::TypeMismatch {
                expected: "Int",
                found: "String"
            }
        ));
    }

    #[test]
    fn display_matches_println_format() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Str("done".into()).to_string(), "done");
        assert_eq!(Value::Null.to_string(), "null");
    }
}

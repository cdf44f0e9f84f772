//! Dynamic value model
//!
//! Every application object is lowered to a [`Value`] tree before encoding.
//! User-defined types become [`Value::Object`]: a stable type identifier plus
//! an ordered attribute map.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StashError};

/// A self-describing application value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Ordered sequence (lists and fixed tuples)
    List(Vec<Value>),
    /// Mapping with unique string keys
    Map(BTreeMap<String, Value>),
    /// Instance of a registered user-defined type
    Object {
        type_name: String,
        attrs: BTreeMap<String, Value>,
    },
}

/// One-byte tag identifying the top-level shape of an encoded value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Null = 0x00,
    Bool = 0x01,
    Int = 0x02,
    Float = 0x03,
    Str = 0x04,
    Bytes = 0x05,
    List = 0x06,
    Map = 0x07,
    Object = 0x08,
}

impl TypeTag {
    /// Parse a tag byte read from the log
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(TypeTag::Null),
            0x01 => Ok(TypeTag::Bool),
            0x02 => Ok(TypeTag::Int),
            0x03 => Ok(TypeTag::Float),
            0x04 => Ok(TypeTag::Str),
            0x05 => Ok(TypeTag::Bytes),
            0x06 => Ok(TypeTag::List),
            0x07 => Ok(TypeTag::Map),
            0x08 => Ok(TypeTag::Object),
            other => Err(StashError::CorruptRecord(format!(
                "unknown type tag: 0x{:02x}",
                other
            ))),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl Value {
    /// Tag of this value's top-level shape
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Str(_) => TypeTag::Str,
            Value::Bytes(_) => TypeTag::Bytes,
            Value::List(_) => TypeTag::List,
            Value::Map(_) => TypeTag::Map,
            Value::Object { .. } => TypeTag::Object,
        }
    }

    /// Human-readable shape name, used in type mismatch errors
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object { .. } => "object",
        }
    }

    /// Build an object value
    pub fn object(type_name: impl Into<String>, attrs: BTreeMap<String, Value>) -> Self {
        Value::Object {
            type_name: type_name.into(),
            attrs,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Walk the tree depth-first, visiting every node including `self`
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Value) -> Result<()>) -> Result<()> {
        f(self)?;
        match self {
            Value::List(items) => {
                for item in items {
                    item.visit(f)?;
                }
            }
            Value::Map(entries) | Value::Object { attrs: entries, .. } => {
                for value in entries.values() {
                    value.visit(f)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Object { type_name, attrs } => {
                write!(f, "{}(", type_name)?;
                for (i, (k, v)) in attrs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                write!(f, ")")
            }
        }
    }
}

//! Value representation
//!
//! Slots of managed fields, arguments and return values. Object slots hold
//! a [`HeapId`] directly; the heap is only traversed by the collector, so a
//! `Value` is plain data and `Copy`.

use crate::object::HeapId;

/// Managed value
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    /// No value (`void` return)
    #[default]
    Void,
    /// Boolean
    Bool(bool),
    /// Signed byte
    Byte(i8),
    /// UTF-16 code unit
    Char(u16),
    /// 16-bit integer
    Short(i16),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Object reference, `None` for null
    Ref(Option<HeapId>),
}

impl Value {
    /// Null reference
    #[inline]
    pub const fn null() -> Self {
        Value::Ref(None)
    }

    /// Reference to `id`
    #[inline]
    pub const fn object(id: HeapId) -> Self {
        Value::Ref(Some(id))
    }

    /// Zero value for a field of type `sig`
    pub fn default_for(sig: &str) -> Self {
        match sig.as_bytes().first() {
            Some(b'Z') => Value::Bool(false),
            Some(b'B') => Value::Byte(0),
            Some(b'C') => Value::Char(0),
            Some(b'S') => Value::Short(0),
            Some(b'I') => Value::Int(0),
            Some(b'J') => Value::Long(0),
            Some(b'F') => Value::Float(0.0),
            Some(b'D') => Value::Double(0.0),
            _ => Value::Ref(None),
        }
    }

    /// Check if this is the null reference
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Ref(None))
    }

    /// Referenced object, `None` for null and for scalars
    #[inline]
    pub fn as_ref_id(&self) -> Option<HeapId> {
        match self {
            Value::Ref(id) => *id,
            _ => None,
        }
    }

    /// Extract boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract an integer of any width up to 32 bits
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Byte(b) => Some(*b as i32),
            Value::Char(c) => Some(*c as i32),
            Value::Short(s) => Some(*s as i32),
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract long value
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(l) => Some(*l),
            other => other.as_int().map(i64::from),
        }
    }

    /// Extract a floating-point value
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Type name for diagnostics
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Bool(_) => "boolean",
            Value::Byte(_) => "byte",
            Value::Char(_) => "char",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Ref(_) => "object",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<HeapId> for Value {
    fn from(id: HeapId) -> Self {
        Value::object(id)
    }
}

impl From<Option<HeapId>> for Value {
    fn from(id: Option<HeapId>) -> Self {
        Value::Ref(id)
    }
}

//! Heap objects
//!
//! Every managed object is a class id, its flattened instance fields and a
//! payload for the builtin classes whose state is not field-shaped
//! (strings, byte arrays, collections, iterators).

use std::fmt;

use crate::types::ClassId;
use crate::value::Value;

/// Index of an object in the heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(pub u32);

impl fmt::Display for HeapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Map entry with the cached `hashCode` of its key
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapEntry {
    /// `hashCode()` of the key
    pub hash: i32,
    /// Key
    pub key: Value,
    /// Value
    pub value: Value,
}

/// Native state of builtin objects
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    /// Plain object
    #[default]
    None,
    /// `vm/lang/String`
    Str(String),
    /// `[B`
    Bytes(Vec<u8>),
    /// `vm/util/ArrayList`
    List(Vec<Value>),
    /// `vm/util/LinkedHashMap`, insertion ordered
    Map(Vec<MapEntry>),
    /// `vm/util/LinkedHashSet`, insertion ordered, with cached hashes
    Set(Vec<(i32, Value)>),
    /// Snapshot iterator
    Iter {
        /// Remaining and consumed items
        items: Vec<Value>,
        /// Next position
        pos: usize,
    },
}

/// Managed object
#[derive(Debug, Clone)]
pub struct HeapObject {
    /// Runtime class
    pub class: ClassId,
    /// Instance fields, inherited first
    pub fields: Vec<Value>,
    /// Builtin state
    pub payload: Payload,
    pub(crate) marked: bool,
    pub(crate) finalized: bool,
}

impl HeapObject {
    /// Create an object of `class`
    pub fn new(class: ClassId, fields: Vec<Value>, payload: Payload) -> Self {
        Self {
            class,
            fields,
            payload,
            marked: false,
            finalized: false,
        }
    }

    /// Push every object referenced by this one onto `out`
    pub fn trace(&self, out: &mut Vec<HeapId>) {
        out.extend(self.fields.iter().filter_map(Value::as_ref_id));
        match &self.payload {
            Payload::List(items) | Payload::Iter { items, .. } => {
                out.extend(items.iter().filter_map(Value::as_ref_id))
            }
            Payload::Set(items) => out.extend(items.iter().filter_map(|(_, v)| v.as_ref_id())),
            Payload::Map(entries) => {
                for entry in entries {
                    out.extend(entry.key.as_ref_id());
                    out.extend(entry.value.as_ref_id());
                }
            }
            Payload::None | Payload::Str(_) | Payload::Bytes(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_fields_and_payload() {
        let obj = HeapObject::new(
            ClassId(1),
            vec![Value::Int(1), Value::object(HeapId(2)), Value::null()],
            Payload::Map(vec![MapEntry {
                hash: 0,
                key: Value::object(HeapId(3)),
                value: Value::object(HeapId(4)),
            }]),
        );
        let mut out = Vec::new();
        obj.trace(&mut out);
        assert_eq!(out, vec![HeapId(2), HeapId(3), HeapId(4)]);
    }

    #[test]
    fn test_trace_strings_have_no_edges() {
        let obj = HeapObject::new(ClassId(0), Vec::new(), Payload::Str("x".into()));
        let mut out = Vec::new();
        obj.trace(&mut out);
        assert!(out.is_empty());
    }
}

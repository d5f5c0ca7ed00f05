//! `vm/util` and `vm/net`: collections, iterators, date, UUID and URI
//!
//! Maps and sets keep insertion order and compare keys through the
//! virtual `hashCode` and `equals`, so native-backed keys (such as
//! `NativeHashable`) behave like any managed key.

use peerlink::classes as names;

use super::{ARRAY_ITERATOR, ILLEGAL_ARGUMENT_EXCEPTION, INDEX_OUT_OF_BOUNDS_EXCEPTION, NO_SUCH_ELEMENT_EXCEPTION, RUNTIME_EXCEPTION};
use crate::object::{HeapId, MapEntry, Payload};
use crate::types::ClassDef;
use crate::value::Value;
use crate::vm::{Raise, Vm};
use crate::VmResult;

// ============================================================================
// Payload access
// ============================================================================

fn list_items(vm: &Vm, id: HeapId) -> VmResult<Vec<Value>> {
    vm.with_payload(id, |p| match p {
        Payload::List(items) => items.clone(),
        _ => Vec::new(),
    })
}

fn set_items(vm: &Vm, id: HeapId) -> VmResult<Vec<(i32, Value)>> {
    vm.with_payload(id, |p| match p {
        Payload::Set(items) => items.clone(),
        _ => Vec::new(),
    })
}

fn map_entries(vm: &Vm, id: HeapId) -> VmResult<Vec<MapEntry>> {
    vm.with_payload(id, |p| match p {
        Payload::Map(entries) => entries.clone(),
        _ => Vec::new(),
    })
}

/// Position of `key` among `(hash, key)` pairs
fn position(vm: &Vm, keys: impl IntoIterator<Item = (i32, Value)>, hash: i32, key: Value) -> Result<Option<usize>, Raise> {
    for (i, (h, k)) in keys.into_iter().enumerate() {
        if h == hash && vm.values_equal(k, key)? {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

fn map_position(vm: &Vm, map: HeapId, key: Value) -> Result<(i32, Option<usize>), Raise> {
    let hash = vm.hash_of(key)?;
    let keys = map_entries(vm, map)?.into_iter().map(|e| (e.hash, e.key));
    Ok((hash, position(vm, keys, hash, key)?))
}

fn set_position(vm: &Vm, set: HeapId, value: Value) -> Result<(i32, Option<usize>), Raise> {
    let hash = vm.hash_of(value)?;
    Ok((hash, position(vm, set_items(vm, set)?, hash, value)?))
}

/// New snapshot iterator over `items`
pub(super) fn iterator(vm: &Vm, items: Vec<Value>) -> Result<Value, Raise> {
    let class = vm.class_named(ARRAY_ITERATOR)?;
    Ok(Value::object(vm.alloc(class.id, Payload::Iter { items, pos: 0 })?))
}

fn index(vm: &Vm, i: i32, len: usize) -> Result<usize, Raise> {
    if i < 0 || i as usize >= len {
        return Err(vm.throw_new(INDEX_OUT_OF_BOUNDS_EXCEPTION, Some(&format!("index {} out of bounds for length {}", i, len))));
    }
    Ok(i as usize)
}

// ============================================================================
// Interfaces
// ============================================================================

fn interfaces(vm: &Vm) -> VmResult<()> {
    vm.define_class(
        ClassDef::interface(names::ITERATOR)
            .abstract_method("hasNext", "()Z")
            .abstract_method("next", "()Lvm/lang/Object;"),
    )?;
    vm.define_class(
        ClassDef::interface(names::LIST)
            .abstract_method("size", "()I")
            .abstract_method("get", "(I)Lvm/lang/Object;")
            .abstract_method("set", "(ILvm/lang/Object;)Lvm/lang/Object;")
            .abstract_method("add", "(Lvm/lang/Object;)Z")
            .abstract_method("remove", "(I)Lvm/lang/Object;")
            .abstract_method("iterator", "()Lvm/util/Iterator;"),
    )?;
    vm.define_class(
        ClassDef::interface(names::MAP)
            .abstract_method("size", "()I")
            .abstract_method("get", "(Lvm/lang/Object;)Lvm/lang/Object;")
            .abstract_method("put", "(Lvm/lang/Object;Lvm/lang/Object;)Lvm/lang/Object;")
            .abstract_method("remove", "(Lvm/lang/Object;)Lvm/lang/Object;")
            .abstract_method("containsKey", "(Lvm/lang/Object;)Z")
            .abstract_method("keySet", "()Lvm/util/Set;"),
    )?;
    vm.define_class(
        ClassDef::interface(names::SET)
            .abstract_method("size", "()I")
            .abstract_method("add", "(Lvm/lang/Object;)Z")
            .abstract_method("contains", "(Lvm/lang/Object;)Z")
            .abstract_method("remove", "(Lvm/lang/Object;)Z")
            .abstract_method("iterator", "()Lvm/util/Iterator;"),
    )?;
    Ok(())
}

// ============================================================================
// Implementations
// ============================================================================

fn array_list(vm: &Vm) -> VmResult<()> {
    vm.define_class(
        ClassDef::new(names::ARRAY_LIST)
            .implements(names::LIST)
            .constructor("()V", |vm, inv| {
                vm.with_payload(inv.this()?, |p| *p = Payload::List(Vec::new()))?;
                Ok(Value::Void)
            })
            .constructor("(I)V", |vm, inv| {
                let capacity = inv.int(0)?.max(0) as usize;
                vm.with_payload(inv.this()?, |p| *p = Payload::List(Vec::with_capacity(capacity)))?;
                Ok(Value::Void)
            })
            .method("size", "()I", |vm, inv| Ok(Value::Int(list_items(vm, inv.this()?)?.len() as i32)))
            .method("get", "(I)Lvm/lang/Object;", |vm, inv| {
                let items = list_items(vm, inv.this()?)?;
                Ok(items[index(vm, inv.int(0)?, items.len())?])
            })
            .method("set", "(ILvm/lang/Object;)Lvm/lang/Object;", |vm, inv| {
                let this = inv.this()?;
                let i = index(vm, inv.int(0)?, list_items(vm, this)?.len())?;
                let value = inv.arg(1);
                let old = vm.with_payload(this, |p| match p {
                    Payload::List(items) => std::mem::replace(&mut items[i], value),
                    _ => Value::null(),
                })?;
                Ok(old)
            })
            .method("add", "(Lvm/lang/Object;)Z", |vm, inv| {
                let value = inv.arg(0);
                vm.with_payload(inv.this()?, |p| {
                    if let Payload::List(items) = p {
                        items.push(value);
                    }
                })?;
                Ok(Value::Bool(true))
            })
            .method("remove", "(I)Lvm/lang/Object;", |vm, inv| {
                let this = inv.this()?;
                let i = index(vm, inv.int(0)?, list_items(vm, this)?.len())?;
                let old = vm.with_payload(this, |p| match p {
                    Payload::List(items) => items.remove(i),
                    _ => Value::null(),
                })?;
                Ok(old)
            })
            .method("iterator", "()Lvm/util/Iterator;", |vm, inv| iterator(vm, list_items(vm, inv.this()?)?))
            .method("equals", "(Lvm/lang/Object;)Z", |vm, inv| {
                let this = inv.this()?;
                let Some(other) = inv.object(0)? else { return Ok(Value::Bool(false)) };
                if !vm.instance_of(other, names::LIST)? {
                    return Ok(Value::Bool(false));
                }
                let mine = list_items(vm, this)?;
                let len = vm.call_virtual(other, "size", "()I", &[])?.as_int().unwrap_or(-1);
                if len as usize != mine.len() {
                    return Ok(Value::Bool(false));
                }
                for (i, item) in mine.into_iter().enumerate() {
                    let theirs = vm.call_virtual(other, "get", "(I)Lvm/lang/Object;", &[Value::Int(i as i32)])?;
                    if !vm.values_equal(item, theirs)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            })
            .method("hashCode", "()I", |vm, inv| {
                let mut hash = 1i32;
                for item in list_items(vm, inv.this()?)? {
                    hash = hash.wrapping_mul(31).wrapping_add(vm.hash_of(item)?);
                }
                Ok(Value::Int(hash))
            }),
    )?;
    Ok(())
}

fn linked_hash_map(vm: &Vm) -> VmResult<()> {
    let init = |vm: &Vm, this: HeapId| vm.with_payload(this, |p| *p = Payload::Map(Vec::new()));
    vm.define_class(
        ClassDef::new(names::LINKED_HASH_MAP)
            .implements(names::MAP)
            .constructor("()V", move |vm, inv| {
                init(vm, inv.this()?)?;
                Ok(Value::Void)
            })
            .constructor("(I)V", move |vm, inv| {
                init(vm, inv.this()?)?;
                Ok(Value::Void)
            })
            .method("size", "()I", |vm, inv| Ok(Value::Int(map_entries(vm, inv.this()?)?.len() as i32)))
            .method("get", "(Lvm/lang/Object;)Lvm/lang/Object;", |vm, inv| {
                let this = inv.this()?;
                match map_position(vm, this, inv.arg(0))?.1 {
                    Some(i) => Ok(map_entries(vm, this)?[i].value),
                    None => Ok(Value::null()),
                }
            })
            .method("containsKey", "(Lvm/lang/Object;)Z", |vm, inv| {
                Ok(Value::Bool(map_position(vm, inv.this()?, inv.arg(0))?.1.is_some()))
            })
            .method("put", "(Lvm/lang/Object;Lvm/lang/Object;)Lvm/lang/Object;", |vm, inv| {
                let this = inv.this()?;
                let (key, value) = (inv.arg(0), inv.arg(1));
                let (hash, found) = map_position(vm, this, key)?;
                let old = vm.with_payload(this, |p| match p {
                    Payload::Map(entries) => match found {
                        Some(i) => std::mem::replace(&mut entries[i].value, value),
                        None => {
                            entries.push(MapEntry { hash, key, value });
                            Value::null()
                        }
                    },
                    _ => Value::null(),
                })?;
                Ok(old)
            })
            .method("remove", "(Lvm/lang/Object;)Lvm/lang/Object;", |vm, inv| {
                let this = inv.this()?;
                let Some(i) = map_position(vm, this, inv.arg(0))?.1 else { return Ok(Value::null()) };
                let old = vm.with_payload(this, |p| match p {
                    Payload::Map(entries) => entries.remove(i).value,
                    _ => Value::null(),
                })?;
                Ok(old)
            })
            .method("keySet", "()Lvm/util/Set;", |vm, inv| {
                let keys = map_entries(vm, inv.this()?)?.into_iter().map(|e| (e.hash, e.key)).collect();
                let class = vm.class_named(names::LINKED_HASH_SET)?;
                Ok(Value::object(vm.alloc(class.id, Payload::Set(keys))?))
            })
            .method("equals", "(Lvm/lang/Object;)Z", |vm, inv| {
                let this = inv.this()?;
                let Some(other) = inv.object(0)? else { return Ok(Value::Bool(false)) };
                if !vm.instance_of(other, names::MAP)? {
                    return Ok(Value::Bool(false));
                }
                let mine = map_entries(vm, this)?;
                let len = vm.call_virtual(other, "size", "()I", &[])?.as_int().unwrap_or(-1);
                if len as usize != mine.len() {
                    return Ok(Value::Bool(false));
                }
                for entry in mine {
                    let has = vm.call_virtual(other, "containsKey", "(Lvm/lang/Object;)Z", &[entry.key])?;
                    if has != Value::Bool(true) {
                        return Ok(Value::Bool(false));
                    }
                    let theirs = vm.call_virtual(other, "get", "(Lvm/lang/Object;)Lvm/lang/Object;", &[entry.key])?;
                    if !vm.values_equal(entry.value, theirs)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            })
            .method("hashCode", "()I", |vm, inv| {
                let mut hash = 0i32;
                for entry in map_entries(vm, inv.this()?)? {
                    hash = hash.wrapping_add(entry.hash ^ vm.hash_of(entry.value)?);
                }
                Ok(Value::Int(hash))
            }),
    )?;
    Ok(())
}

fn linked_hash_set(vm: &Vm) -> VmResult<()> {
    let init = |vm: &Vm, this: HeapId| vm.with_payload(this, |p| *p = Payload::Set(Vec::new()));
    vm.define_class(
        ClassDef::new(names::LINKED_HASH_SET)
            .implements(names::SET)
            .constructor("()V", move |vm, inv| {
                init(vm, inv.this()?)?;
                Ok(Value::Void)
            })
            .constructor("(I)V", move |vm, inv| {
                init(vm, inv.this()?)?;
                Ok(Value::Void)
            })
            .method("size", "()I", |vm, inv| Ok(Value::Int(set_items(vm, inv.this()?)?.len() as i32)))
            .method("contains", "(Lvm/lang/Object;)Z", |vm, inv| {
                Ok(Value::Bool(set_position(vm, inv.this()?, inv.arg(0))?.1.is_some()))
            })
            .method("add", "(Lvm/lang/Object;)Z", |vm, inv| {
                let this = inv.this()?;
                let value = inv.arg(0);
                let (hash, found) = set_position(vm, this, value)?;
                if found.is_some() {
                    return Ok(Value::Bool(false));
                }
                vm.with_payload(this, |p| {
                    if let Payload::Set(items) = p {
                        items.push((hash, value));
                    }
                })?;
                Ok(Value::Bool(true))
            })
            .method("remove", "(Lvm/lang/Object;)Z", |vm, inv| {
                let this = inv.this()?;
                let Some(i) = set_position(vm, this, inv.arg(0))?.1 else { return Ok(Value::Bool(false)) };
                vm.with_payload(this, |p| {
                    if let Payload::Set(items) = p {
                        items.remove(i);
                    }
                })?;
                Ok(Value::Bool(true))
            })
            .method("iterator", "()Lvm/util/Iterator;", |vm, inv| {
                iterator(vm, set_items(vm, inv.this()?)?.into_iter().map(|(_, v)| v).collect())
            })
            .method("equals", "(Lvm/lang/Object;)Z", |vm, inv| {
                let this = inv.this()?;
                let Some(other) = inv.object(0)? else { return Ok(Value::Bool(false)) };
                if !vm.instance_of(other, names::SET)? {
                    return Ok(Value::Bool(false));
                }
                let mine = set_items(vm, this)?;
                let len = vm.call_virtual(other, "size", "()I", &[])?.as_int().unwrap_or(-1);
                if len as usize != mine.len() {
                    return Ok(Value::Bool(false));
                }
                for (_, item) in mine {
                    if vm.call_virtual(other, "contains", "(Lvm/lang/Object;)Z", &[item])? != Value::Bool(true) {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            })
            .method("hashCode", "()I", |vm, inv| {
                let hash = set_items(vm, inv.this()?)?
                    .iter()
                    .fold(0i32, |acc, (h, _)| acc.wrapping_add(*h));
                Ok(Value::Int(hash))
            }),
    )?;
    Ok(())
}

fn array_iterator(vm: &Vm) -> VmResult<()> {
    vm.define_class(ClassDef::new(NO_SUCH_ELEMENT_EXCEPTION).extends(RUNTIME_EXCEPTION).constructor("()V", |_, _| Ok(Value::Void)))?;
    vm.define_class(
        ClassDef::new(ARRAY_ITERATOR)
            .implements(names::ITERATOR)
            .method("hasNext", "()Z", |vm, inv| {
                let more = vm.with_payload(inv.this()?, |p| match p {
                    Payload::Iter { items, pos } => *pos < items.len(),
                    _ => false,
                })?;
                Ok(Value::Bool(more))
            })
            .method("next", "()Lvm/lang/Object;", |vm, inv| {
                let next = vm.with_payload(inv.this()?, |p| match p {
                    Payload::Iter { items, pos } => {
                        let item = items.get(*pos).copied();
                        *pos += 1;
                        item
                    }
                    _ => None,
                })?;
                next.ok_or_else(|| vm.throw_new(NO_SUCH_ELEMENT_EXCEPTION, None))
            }),
    )?;
    Ok(())
}

// ============================================================================
// Date, UUID, URI
// ============================================================================

/// Class holding one value field, compared by that field
pub(super) fn value_class(name: &'static str, field: &'static str, sig: impl Into<String>) -> ClassDef {
    ClassDef::new(name)
        .field(field, sig)
        .method("equals", "(Lvm/lang/Object;)Z", move |vm, inv| {
            let this = inv.this()?;
            match inv.object(0)? {
                Some(other) if vm.instance_of(other, name)? => {
                    Ok(Value::Bool(vm.values_equal(vm.field(this, field)?, vm.field(other, field)?)?))
                }
                _ => Ok(Value::Bool(false)),
            }
        })
        .method("hashCode", "()I", move |vm, inv| Ok(Value::Int(vm.hash_of(vm.field(inv.this()?, field)?)?)))
}

fn value_types(vm: &Vm) -> VmResult<()> {
    vm.define_class(
        value_class(names::DATE, "time", "J")
            .constructor("(J)V", |vm, inv| {
                vm.put_field(inv.this()?, "time", Value::Long(inv.long(0)?))?;
                Ok(Value::Void)
            })
            .method("getTime", "()J", |vm, inv| Ok(vm.field(inv.this()?, "time")?)),
    )?;

    vm.define_class(
        value_class(names::UUID, "text", "Lvm/lang/String;")
            .constructor("(Lvm/lang/String;)V", |vm, inv| {
                vm.put_field(inv.this()?, "text", inv.arg(0))?;
                Ok(Value::Void)
            })
            .static_method("fromString", "(Lvm/lang/String;)Lvm/util/UUID;", |vm, inv| {
                let text = vm.string_of(vm.non_null(inv.object(0)?)?)?;
                let parsed = uuid::Uuid::parse_str(&text)
                    .map_err(|e| vm.throw_new(ILLEGAL_ARGUMENT_EXCEPTION, Some(&format!("invalid UUID `{}`: {}", text, e))))?;
                let canonical = vm.alloc_string(&parsed.hyphenated().to_string())?;
                Ok(Value::object(vm.construct(names::UUID, "(Lvm/lang/String;)V", &[Value::object(canonical)])?))
            })
            .method("toString", "()Lvm/lang/String;", |vm, inv| Ok(vm.field(inv.this()?, "text")?)),
    )?;

    vm.define_class(
        value_class(names::URI, "text", "Lvm/lang/String;")
            .constructor("(Lvm/lang/String;)V", |vm, inv| {
                let text = vm.non_null(inv.object(0)?)?;
                vm.put_field(inv.this()?, "text", Value::object(text))?;
                Ok(Value::Void)
            })
            .method("toString", "()Lvm/lang/String;", |vm, inv| Ok(vm.field(inv.this()?, "text")?)),
    )?;
    Ok(())
}

pub(super) fn install(vm: &Vm) -> VmResult<()> {
    interfaces(vm)?;
    array_iterator(vm)?;
    array_list(vm)?;
    linked_hash_set(vm)?;
    linked_hash_map(vm)?;
    value_types(vm)
}

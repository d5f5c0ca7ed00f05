//! Bridged wrapper library: `bridge/lib` and `bridge/foundation`
//!
//! Each wrapper holds one idiomatic object. Constructed with `nocopy` it
//! shares that object (mutations through either side are visible to
//! both); otherwise it holds a private copy. `kotlin(Z)` hands the held
//! object back, shared or copied the same way.

use peerlink::classes as names;

use super::util::value_class;
use super::ILLEGAL_ARGUMENT_EXCEPTION;
use crate::object::HeapId;
use crate::types::ClassDef;
use crate::value::Value;
use crate::vm::{Raise, Vm};
use crate::VmResult;

type CopyFn = fn(&Vm, HeapId) -> Result<HeapId, Raise>;

fn for_each(vm: &Vm, iterable: HeapId, mut f: impl FnMut(Value) -> Result<(), Raise>) -> Result<(), Raise> {
    let iter = vm.call_virtual(iterable, "iterator", "()Lvm/util/Iterator;", &[])?;
    let iter = vm.non_null(iter.as_ref_id())?;
    while vm.call_virtual(iter, "hasNext", "()Z", &[])? == Value::Bool(true) {
        f(vm.call_virtual(iter, "next", "()Lvm/lang/Object;", &[])?)?;
    }
    Ok(())
}

fn copy_list(vm: &Vm, list: HeapId) -> Result<HeapId, Raise> {
    let len = vm.call_virtual(list, "size", "()I", &[])?.as_int().unwrap_or(0);
    let copy = vm.construct(names::ARRAY_LIST, "(I)V", &[Value::Int(len)])?;
    for i in 0..len {
        let item = vm.call_virtual(list, "get", "(I)Lvm/lang/Object;", &[Value::Int(i)])?;
        vm.call_virtual(copy, "add", "(Lvm/lang/Object;)Z", &[item])?;
    }
    Ok(copy)
}

fn copy_set(vm: &Vm, set: HeapId) -> Result<HeapId, Raise> {
    let copy = vm.construct(names::LINKED_HASH_SET, "()V", &[])?;
    for_each(vm, set, |item| {
        vm.call_virtual(copy, "add", "(Lvm/lang/Object;)Z", &[item])?;
        Ok(())
    })?;
    Ok(copy)
}

fn copy_map(vm: &Vm, map: HeapId) -> Result<HeapId, Raise> {
    let copy = vm.construct(names::LINKED_HASH_MAP, "()V", &[])?;
    let keys = vm.non_null(vm.call_virtual(map, "keySet", "()Lvm/util/Set;", &[])?.as_ref_id())?;
    for_each(vm, keys, |key| {
        let value = vm.call_virtual(map, "get", "(Lvm/lang/Object;)Lvm/lang/Object;", &[key])?;
        vm.call_virtual(copy, "put", "(Lvm/lang/Object;Lvm/lang/Object;)Lvm/lang/Object;", &[key, value])?;
        Ok(())
    })?;
    Ok(copy)
}

fn copy_bytes(vm: &Vm, bytes: HeapId) -> Result<HeapId, Raise> {
    Ok(vm.alloc_bytes(&vm.bytes_of(bytes)?)?)
}

/// Wrapper around one object of type `held`, with the standard
/// `(held, nocopy, shared)` constructor and `kotlin(Z)` accessor
fn wrapper(name: &'static str, field: &'static str, held: &'static str, copy: CopyFn) -> ClassDef {
    let held_sig = format!("L{};", held);
    value_class(name, field, held_sig.clone())
        .constructor(&format!("({}ZZ)V", held_sig), move |vm, inv| {
            let container = vm.non_null(inv.object(0)?)?;
            let stored = if inv.bool(1)? { container } else { copy(vm, container)? };
            vm.put_field(inv.this()?, field, Value::object(stored))?;
            Ok(Value::Void)
        })
        .method("kotlin", &format!("(Z){}", held_sig), move |vm, inv| {
            let held = vm.non_null(vm.field(inv.this()?, field)?.as_ref_id())?;
            let out = if inv.bool(0)? { held } else { copy(vm, held)? };
            Ok(Value::object(out))
        })
}

/// Forward `name` to the held object
fn delegate(def: ClassDef, field: &'static str, name: &'static str, sig: &'static str) -> ClassDef {
    def.method(name, sig, move |vm, inv| {
        let held = vm.non_null(vm.field(inv.this()?, field)?.as_ref_id())?;
        vm.call_virtual(held, name, sig, inv.args)
    })
}

fn collections(vm: &Vm) -> VmResult<()> {
    let array = wrapper(names::BRIDGED_ARRAY, "list", names::LIST, copy_list);
    let array = delegate(array, "list", "size", "()I");
    let array = delegate(array, "list", "get", "(I)Lvm/lang/Object;");
    let array = delegate(array, "list", "add", "(Lvm/lang/Object;)Z");
    vm.define_class(array)?;

    let dictionary = wrapper(names::BRIDGED_DICTIONARY, "map", names::MAP, copy_map);
    let dictionary = delegate(dictionary, "map", "size", "()I");
    let dictionary = delegate(dictionary, "map", "get", "(Lvm/lang/Object;)Lvm/lang/Object;");
    let dictionary = delegate(dictionary, "map", "put", "(Lvm/lang/Object;Lvm/lang/Object;)Lvm/lang/Object;");
    vm.define_class(dictionary)?;

    let set = wrapper(names::BRIDGED_SET, "set", names::SET, copy_set);
    let set = delegate(set, "set", "size", "()I");
    let set = delegate(set, "set", "contains", "(Lvm/lang/Object;)Z");
    let set = delegate(set, "set", "add", "(Lvm/lang/Object;)Z");
    vm.define_class(set)?;

    vm.define_class(
        value_class(names::BRIDGED_RESULT, "result", "Lvm/lang/Result;")
            .constructor("(Lvm/lang/Result;)V", |vm, inv| {
                let result = vm.non_null(inv.object(0)?)?;
                vm.put_field(inv.this()?, "result", Value::object(result))?;
                Ok(Value::Void)
            })
            .method("kotlin", "(Z)Lvm/lang/Result;", |vm, inv| Ok(vm.field(inv.this()?, "result")?)),
    )?;
    Ok(())
}

fn foundation(vm: &Vm) -> VmResult<()> {
    vm.define_class(
        value_class(names::BRIDGED_DATA, "bytes", "[B")
            .constructor("([B)V", |vm, inv| {
                let bytes = vm.non_null(inv.object(0)?)?;
                vm.put_field(inv.this()?, "bytes", Value::object(bytes))?;
                Ok(Value::Void)
            })
            .method("kotlin", "(Z)[B", |vm, inv| {
                let held = vm.non_null(vm.field(inv.this()?, "bytes")?.as_ref_id())?;
                let out = if inv.bool(0)? { held } else { copy_bytes(vm, held)? };
                Ok(Value::object(out))
            })
            .method("length", "()I", |vm, inv| {
                let held = vm.non_null(vm.field(inv.this()?, "bytes")?.as_ref_id())?;
                Ok(Value::Int(vm.bytes_of(held)?.len() as i32))
            }),
    )?;

    vm.define_class(
        value_class(names::BRIDGED_DATE, "date", "Lvm/util/Date;")
            .constructor("(Lvm/util/Date;)V", |vm, inv| {
                let date = vm.non_null(inv.object(0)?)?;
                vm.put_field(inv.this()?, "date", Value::object(date))?;
                Ok(Value::Void)
            })
            .method("getTimeIntervalSince1970", "()D", |vm, inv| {
                let date = vm.non_null(vm.field(inv.this()?, "date")?.as_ref_id())?;
                let millis = vm.call_virtual(date, "getTime", "()J", &[])?.as_long().unwrap_or(0);
                Ok(Value::Double(millis as f64 / 1000.0))
            }),
    )?;

    vm.define_class(
        value_class(names::BRIDGED_UUID, "uuidString", "Lvm/lang/String;")
            .constructor("(Lvm/lang/String;)V", |vm, inv| {
                let text = vm.non_null(inv.object(0)?)?;
                vm.put_field(inv.this()?, "uuidString", Value::object(text))?;
                Ok(Value::Void)
            })
            .method("getUuidString", "()Lvm/lang/String;", |vm, inv| Ok(vm.field(inv.this()?, "uuidString")?)),
    )?;

    vm.define_class(
        value_class(names::BRIDGED_URL, "absoluteString", "Lvm/lang/String;")
            .constructor("(Lvm/lang/String;Lbridge/foundation/URL;)V", |vm, inv| {
                let text = vm.string_of(vm.non_null(inv.object(0)?)?)?;
                let absolute = match inv.object(1)? {
                    None => text,
                    Some(base) => {
                        let base = vm.string_of(vm.non_null(vm.field(base, "absoluteString")?.as_ref_id())?)?;
                        url::Url::parse(&base)
                            .and_then(|base| base.join(&text))
                            .map(String::from)
                            .map_err(|e| {
                                vm.throw_new(ILLEGAL_ARGUMENT_EXCEPTION, Some(&format!("cannot resolve `{}`: {}", text, e)))
                            })?
                    }
                };
                let absolute = vm.alloc_string(&absolute)?;
                vm.put_field(inv.this()?, "absoluteString", Value::object(absolute))?;
                Ok(Value::Void)
            })
            .method("getAbsoluteString", "()Lvm/lang/String;", |vm, inv| {
                Ok(vm.field(inv.this()?, "absoluteString")?)
            }),
    )?;
    Ok(())
}

pub(super) fn install(vm: &Vm) -> VmResult<()> {
    collections(vm)?;
    foundation(vm)
}

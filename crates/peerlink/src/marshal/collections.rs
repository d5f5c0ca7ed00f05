//! Sequences, mappings and sets
//!
//! Elements convert one at a time and each element's local reference is
//! deleted as soon as it has been consumed, so converting a large container
//! never grows the managed local table by more than a few entries.

use std::collections::{HashMap, HashSet};
use std::hash::{BuildHasher, Hash};

use crate::bridge::Bridge;
use crate::classes;
use crate::convert::{element_from_managed, require, Bridgeable};
use crate::error::{BridgeError, BridgeResult};
use crate::options::MarshalOptions;
use crate::refs::{object_value, LocalRef};
use crate::value::{ManagedValue, ObjRef};

const KOTLIN_LIST: (&str, &str) = ("kotlin", "(Z)Lvm/util/List;");
const KOTLIN_MAP: (&str, &str) = ("kotlin", "(Z)Lvm/util/Map;");
const KOTLIN_SET: (&str, &str) = ("kotlin", "(Z)Lvm/util/Set;");
const BRIDGED_LIST_CTOR: &str = "(Lvm/util/List;ZZ)V";
const BRIDGED_MAP_CTOR: &str = "(Lvm/util/Map;ZZ)V";
const BRIDGED_SET_CTOR: &str = "(Lvm/util/Set;ZZ)V";
const CAPACITY_CTOR: &str = "(I)V";
const DEFAULT_CTOR: &str = "()V";

const SIZE: (&str, &str) = ("size", "()I");
const LIST_GET: (&str, &str) = ("get", "(I)Lvm/lang/Object;");
const ADD: (&str, &str) = ("add", "(Lvm/lang/Object;)Z");
const MAP_GET: (&str, &str) = ("get", "(Lvm/lang/Object;)Lvm/lang/Object;");
const MAP_PUT: (&str, &str) = ("put", "(Lvm/lang/Object;Lvm/lang/Object;)Lvm/lang/Object;");
const KEY_SET: (&str, &str) = ("keySet", "()Lvm/util/Set;");
const ITERATOR: (&str, &str) = ("iterator", "()Lvm/util/Iterator;");
const HAS_NEXT: (&str, &str) = ("hasNext", "()Z");
const NEXT: (&str, &str) = ("next", "()Lvm/lang/Object;");

/// The idiomatic container behind `obj`: itself in compat mode, otherwise
/// the backing container of the bridged wrapper
fn unwrap_container<'b>(
    bridge: &'b Bridge,
    obj: ObjRef,
    wrapper: &str,
    kotlin: (&str, &str),
    options: MarshalOptions,
) -> BridgeResult<LocalRef<'b>> {
    if options.is_compat() {
        return Ok(bridge.local(bridge.env().new_local_ref(obj)?));
    }
    let (name, sig) = kotlin;
    let value = bridge.call_method_raw(obj, wrapper, name, sig, &[ManagedValue::bool(true)])?;
    bridge
        .adopt(value)
        .ok_or_else(|| BridgeError::InvalidValue(format!("`{}` has no backing container", wrapper)))
}

/// Wrap an idiomatic container unless compat mode asks for it bare
fn wrap_container<'b>(
    bridge: &'b Bridge,
    container: LocalRef<'b>,
    wrapper: &str,
    ctor: &str,
    options: MarshalOptions,
) -> BridgeResult<Option<LocalRef<'b>>> {
    if options.is_compat() {
        return Ok(Some(container));
    }
    let nocopy = ManagedValue::bool(true);
    let shared = ManagedValue::bool(false);
    bridge
        .new_object_raw(wrapper, ctor, &[container.value(), nocopy, shared])
        .map(Some)
}

fn size_of(bridge: &Bridge, container: ObjRef, class: &str) -> BridgeResult<i32> {
    let (name, sig) = SIZE;
    let value = bridge.call_method_raw(container, class, name, sig, &[])?;
    value.as_int().ok_or_else(|| BridgeError::mismatch("int", value.type_name()))
}

fn capacity(len: usize) -> ManagedValue {
    ManagedValue::int(i32::try_from(len).unwrap_or(i32::MAX))
}

/// Visit every element of a managed set, in iteration order
fn for_each_in_set(
    bridge: &Bridge,
    set: ObjRef,
    mut visit: impl FnMut(Option<ObjRef>) -> BridgeResult<()>,
) -> BridgeResult<()> {
    let (name, sig) = ITERATOR;
    let value = bridge.call_method_raw(set, classes::SET, name, sig, &[])?;
    let iterator = bridge.local(require(value.as_object().flatten(), "Iterator")?);
    loop {
        let (name, sig) = HAS_NEXT;
        let more = bridge.call_method_raw(iterator.obj(), classes::ITERATOR, name, sig, &[])?;
        if !more.as_bool().unwrap_or(false) {
            return Ok(());
        }
        let (name, sig) = NEXT;
        let next = bridge.call_method_raw(iterator.obj(), classes::ITERATOR, name, sig, &[])?;
        let element = bridge.adopt(next);
        visit(element.as_ref().map(LocalRef::obj))?;
    }
}

fn add_to(bridge: &Bridge, container: ObjRef, class: &str, element: Option<&LocalRef<'_>>) -> BridgeResult<()> {
    let (name, sig) = ADD;
    bridge
        .call_method_raw(container, class, name, sig, &[object_value(element)])
        .map(drop)
}

// ============================================================================
// Vec
// ============================================================================

impl<T: Bridgeable> Bridgeable for Vec<T> {
    fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, options: MarshalOptions) -> BridgeResult<Self> {
        let obj = require(obj, "Vec")?;
        let list = unwrap_container(bridge, obj, classes::BRIDGED_ARRAY, KOTLIN_LIST, options)?;
        let size = size_of(bridge, list.obj(), classes::LIST)?;
        let mut items = Vec::with_capacity(size.max(0) as usize);
        for index in 0..size {
            let (name, sig) = LIST_GET;
            let value = bridge.call_method_raw(list.obj(), classes::LIST, name, sig, &[ManagedValue::int(index)])?;
            let element = bridge.adopt(value);
            items.push(element_from_managed::<T>(bridge, element.as_ref().map(LocalRef::obj), options)?);
        }
        Ok(items)
    }

    fn to_managed<'b>(&self, bridge: &'b Bridge, options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
        let list = bridge.new_object_raw(classes::ARRAY_LIST, CAPACITY_CTOR, &[capacity(self.len())])?;
        for item in self {
            let element = item.to_managed(bridge, options)?;
            add_to(bridge, list.obj(), classes::LIST, element.as_ref())?;
        }
        wrap_container(bridge, list, classes::BRIDGED_ARRAY, BRIDGED_LIST_CTOR, options)
    }
}

// ============================================================================
// HashMap
// ============================================================================

impl<K, V, S> Bridgeable for HashMap<K, V, S>
where
    K: Bridgeable + Eq + Hash,
    V: Bridgeable,
    S: BuildHasher + Default,
{
    fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, options: MarshalOptions) -> BridgeResult<Self> {
        let obj = require(obj, "HashMap")?;
        let map = unwrap_container(bridge, obj, classes::BRIDGED_DICTIONARY, KOTLIN_MAP, options)?;
        let size = size_of(bridge, map.obj(), classes::MAP)?;
        let mut entries = HashMap::with_capacity_and_hasher(size.max(0) as usize, S::default());

        let (name, sig) = KEY_SET;
        let keys = bridge.call_method_raw(map.obj(), classes::MAP, name, sig, &[])?;
        let keys = bridge.local(require(keys.as_object().flatten(), "key set")?);
        for_each_in_set(bridge, keys.obj(), |key_obj| {
            let key = element_from_managed::<K>(bridge, key_obj, options)?;
            let (name, sig) = MAP_GET;
            let value = bridge.call_method_raw(map.obj(), classes::MAP, name, sig, &[ManagedValue::object(key_obj)])?;
            let value_obj = bridge.adopt(value);
            let value = element_from_managed::<V>(bridge, value_obj.as_ref().map(LocalRef::obj), options)?;
            entries.insert(key, value);
            Ok(())
        })?;
        Ok(entries)
    }

    fn to_managed<'b>(&self, bridge: &'b Bridge, options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
        let map = bridge.new_object_raw(classes::LINKED_HASH_MAP, CAPACITY_CTOR, &[capacity(self.len())])?;
        for (key, value) in self {
            let key = key.to_managed(bridge, options)?;
            let value = value.to_managed(bridge, options)?;
            let (name, sig) = MAP_PUT;
            let previous = bridge.call_method_raw(
                map.obj(),
                classes::MAP,
                name,
                sig,
                &[object_value(key.as_ref()), object_value(value.as_ref())],
            )?;
            drop(bridge.adopt(previous));
        }
        wrap_container(bridge, map, classes::BRIDGED_DICTIONARY, BRIDGED_MAP_CTOR, options)
    }
}

// ============================================================================
// HashSet
// ============================================================================

impl<T, S> Bridgeable for HashSet<T, S>
where
    T: Bridgeable + Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, options: MarshalOptions) -> BridgeResult<Self> {
        let obj = require(obj, "HashSet")?;
        let set = unwrap_container(bridge, obj, classes::BRIDGED_SET, KOTLIN_SET, options)?;
        let size = size_of(bridge, set.obj(), classes::SET)?;
        let mut items = HashSet::with_capacity_and_hasher(size.max(0) as usize, S::default());
        for_each_in_set(bridge, set.obj(), |element| {
            items.insert(element_from_managed::<T>(bridge, element, options)?);
            Ok(())
        })?;
        Ok(items)
    }

    fn to_managed<'b>(&self, bridge: &'b Bridge, options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
        let set = bridge.new_object_raw(classes::LINKED_HASH_SET, DEFAULT_CTOR, &[])?;
        for item in self {
            let element = item.to_managed(bridge, options)?;
            add_to(bridge, set.obj(), classes::SET, element.as_ref())?;
        }
        wrap_container(bridge, set, classes::BRIDGED_SET, BRIDGED_SET_CTOR, options)
    }
}

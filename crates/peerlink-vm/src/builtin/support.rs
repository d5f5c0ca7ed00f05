//! `bridge/kt`: classes the bridge itself calls into
//!
//! `BridgeSupport` answers the runtime-category, projection and peer
//! queries. The peer-holding classes (`NativeClosure0`, `NativeHashable`,
//! `Completion`) carry a handle into the bridge's handle table and forward
//! their work to natives the bridge binds on startup.

use peerlink::classes as names;
use peerlink::TypeCategory;

use crate::object::HeapId;
use crate::types::ClassDef;
use crate::value::Value;
use crate::vm::{Raise, Vm};
use crate::VmResult;

/// Classes reporting a category other than `other`, most specific first
const DISCRIMINATORS: [(&str, TypeCategory); 25] = [
    (names::BRIDGED_ARRAY, TypeCategory::BridgedList),
    (names::BRIDGED_DATA, TypeCategory::BridgedData),
    (names::BRIDGED_DATE, TypeCategory::BridgedDate),
    (names::BRIDGED_DICTIONARY, TypeCategory::BridgedMap),
    (names::BRIDGED_RESULT, TypeCategory::BridgedResult),
    (names::BRIDGED_SET, TypeCategory::BridgedSet),
    (names::BRIDGED_UUID, TypeCategory::BridgedUuid),
    (names::BRIDGED_URL, TypeCategory::BridgedUri),
    (names::BOOLEAN.0, TypeCategory::Boolean),
    (names::BYTE.0, TypeCategory::Byte),
    (names::CHARACTER.0, TypeCategory::Char),
    (names::SHORT.0, TypeCategory::Short),
    (names::INTEGER.0, TypeCategory::Int),
    (names::LONG.0, TypeCategory::Long),
    (names::FLOAT.0, TypeCategory::Float),
    (names::DOUBLE.0, TypeCategory::Double),
    (names::STRING, TypeCategory::String),
    (names::BYTE_ARRAY, TypeCategory::ByteArray),
    (names::DATE, TypeCategory::Date),
    (names::LIST, TypeCategory::List),
    (names::MAP, TypeCategory::Map),
    (names::RESULT, TypeCategory::Result),
    (names::SET, TypeCategory::Set),
    (names::UUID, TypeCategory::Uuid),
    (names::URI, TypeCategory::Uri),
];

/// Category of a managed object
pub fn discriminate(vm: &Vm, obj: HeapId) -> VmResult<TypeCategory> {
    for (class, category) in DISCRIMINATORS {
        if vm.instance_of(obj, class)? {
            return Ok(category);
        }
    }
    Ok(TypeCategory::Other)
}

fn peer_of(vm: &Vm, obj: HeapId) -> VmResult<i64> {
    if !vm.instance_of(obj, names::PEER_BRIDGED)? {
        return Ok(0);
    }
    Ok(vm.field(obj, "peer")?.as_long().unwrap_or(0))
}

fn support(vm: &Vm) -> VmResult<()> {
    let (discriminator, discriminator_sig) = names::TYPE_DISCRIMINATOR;
    let (projection, projection_sig) = names::PROJECTION;
    let (peer, peer_sig) = names::PEER_OF;
    vm.define_class(
        ClassDef::new(names::BRIDGE_SUPPORT)
            .static_method(discriminator, discriminator_sig, |vm, inv| {
                let obj = vm.non_null(inv.object(0)?)?;
                let category = discriminate(vm, obj)?;
                Ok(Value::object(vm.alloc_string(category.as_str())?))
            })
            .static_method(projection, projection_sig, |vm, inv| {
                let Some(obj) = inv.object(0)? else { return Ok(Value::null()) };
                let (hook, hook_sig) = names::PROJECTION_HOOK;
                let class = vm.runtime_class(obj)?;
                if vm.with_classes(|c| c.find_virtual(class, hook, hook_sig)).is_none() {
                    return Ok(Value::null());
                }
                vm.call_virtual(obj, hook, hook_sig, &[Value::Int(inv.int(1)?)])
            })
            .static_method(peer, peer_sig, |vm, inv| match inv.object(0)? {
                Some(obj) => Ok(Value::Long(peer_of(vm, obj)?)),
                None => Ok(Value::Long(0)),
            }),
    )?;
    Ok(())
}

fn peer_field(vm: &Vm, this: HeapId) -> Result<Value, Raise> {
    Ok(vm.field(this, "peer")?)
}

fn peer_classes(vm: &Vm) -> VmResult<()> {
    vm.define_class(ClassDef::interface(names::PEER_BRIDGED))?;

    vm.define_class(
        ClassDef::peer(names::NATIVE_CLOSURE, None)
            .native_method("invokeNative", "(J)Lvm/lang/Object;")
            .method("invoke", "()Lvm/lang/Object;", |vm, inv| {
                let this = inv.this()?;
                let peer = peer_field(vm, this)?;
                vm.call_virtual(this, "invokeNative", "(J)Lvm/lang/Object;", &[peer])
            }),
    )?;

    let (hook, hook_sig) = names::PROJECTION_HOOK;
    vm.define_class(
        ClassDef::peer(names::NATIVE_HASHABLE, None)
            .native_method("hashCodeNative", "(J)I")
            .native_method("equalsNative", "(JJ)Z")
            .native_method(hook, hook_sig)
            .method("hashCode", "()I", |vm, inv| {
                let this = inv.this()?;
                let peer = peer_field(vm, this)?;
                vm.call_virtual(this, "hashCodeNative", "(J)I", &[peer])
            })
            .method("equals", "(Lvm/lang/Object;)Z", |vm, inv| {
                let this = inv.this()?;
                match inv.object(0)? {
                    Some(other) if other == this => Ok(Value::Bool(true)),
                    Some(other) if vm.instance_of(other, names::NATIVE_HASHABLE)? => {
                        let (a, b) = (peer_field(vm, this)?, peer_field(vm, other)?);
                        vm.call_virtual(this, "equalsNative", "(JJ)Z", &[a, b])
                    }
                    _ => Ok(Value::Bool(false)),
                }
            }),
    )?;

    vm.define_class(
        ClassDef::peer(names::COMPLETION, None)
            .native_method("resumeNative", "(JLvm/lang/Object;Lvm/lang/Throwable;)V")
            .method("resume", "(Lvm/lang/Object;Lvm/lang/Throwable;)V", |vm, inv| {
                let this = inv.this()?;
                let peer = peer_field(vm, this)?;
                vm.call_virtual(
                    this,
                    "resumeNative",
                    "(JLvm/lang/Object;Lvm/lang/Throwable;)V",
                    &[peer, inv.arg(0), inv.arg(1)],
                )
            }),
    )?;
    Ok(())
}

pub(super) fn install(vm: &Vm) -> VmResult<()> {
    peer_classes(vm)?;
    support(vm)
}

//! [`ManagedEnv`] implementation
//!
//! Method ids pack `class << 32 | method index`; field ids pack
//! `class << 32 | slot`, with the top bit set for static fields.

use std::thread;

use peerlink::classes::THROWABLE;
use peerlink::{BridgeError, BridgeResult, ClassRef, FieldId, ManagedEnv, ManagedValue, MethodId, NativeMethod, ObjRef};

use super::{Raise, Vm};
use crate::object::Payload;
use crate::types::{ClassId, CONSTRUCTOR};
use crate::value::Value;
use crate::VmError;

const STATIC_FIELD: u64 = 1 << 63;

fn pack(class: ClassId, index: usize) -> u64 {
    ((class.0 as u64) << 32) | index as u64
}

fn unpack(raw: u64) -> (ClassId, usize) {
    (ClassId(((raw & !STATIC_FIELD) >> 32) as u32), (raw & 0xffff_ffff) as usize)
}

impl Vm {
    fn values(&self, args: &[ManagedValue]) -> BridgeResult<Vec<Value>> {
        args.iter()
            .map(|a| self.from_managed(*a).map_err(BridgeError::from))
            .collect()
    }

    /// Map the outcome of a managed call onto the pending-exception model
    fn finish(&self, result: Result<Value, Raise>) -> BridgeResult<ManagedValue> {
        match result {
            Ok(value) => Ok(self.to_managed(value)?),
            Err(Raise::Throw(thrown)) => {
                self.pending.insert(thread::current().id(), thrown);
                Ok(ManagedValue::void())
            }
            Err(Raise::Fault(e)) => Err(e.into()),
        }
    }

    fn method_of(&self, id: MethodId) -> BridgeResult<(std::sync::Arc<crate::types::Class>, usize)> {
        let (class, index) = unpack(id.0);
        let class = self.class(class)?;
        if index >= class.methods.len() {
            return Err(BridgeError::Runtime(format!("invalid method id {:#x}", id.0)));
        }
        Ok((class, index))
    }
}

impl ManagedEnv for Vm {
    fn find_class(&self, name: &str) -> Option<ClassRef> {
        self.with_classes(|c| c.lookup(name).map(|class| class.id.into()))
    }

    fn class_name(&self, class: ClassRef) -> String {
        self.class(class.into()).map(|c| c.name.clone()).unwrap_or_default()
    }

    fn class_of(&self, obj: ObjRef) -> BridgeResult<ClassRef> {
        let _entered = self.enter();
        Ok(self.runtime_class(self.refs.resolve(obj)?)?.into())
    }

    fn is_instance_of(&self, obj: ObjRef, class: ClassRef) -> BridgeResult<bool> {
        let _entered = self.enter();
        let runtime = self.runtime_class(self.refs.resolve(obj)?)?;
        Ok(self.with_classes(|c| c.is_subclass(runtime, class.into())))
    }

    fn method_id(&self, class: ClassRef, name: &str, sig: &str) -> Option<MethodId> {
        self.with_classes(|c| c.find_method(class.into(), name, sig, false))
            .map(|(owner, index)| MethodId(pack(owner, index)))
    }

    fn static_method_id(&self, class: ClassRef, name: &str, sig: &str) -> Option<MethodId> {
        self.with_classes(|c| c.find_method(class.into(), name, sig, true))
            .map(|(owner, index)| MethodId(pack(owner, index)))
    }

    fn field_id(&self, class: ClassRef, name: &str, sig: &str) -> Option<FieldId> {
        let class: ClassId = class.into();
        self.with_classes(|c| c.find_field(class, name, sig))
            .map(|slot| FieldId(pack(class, slot)))
    }

    fn static_field_id(&self, class: ClassRef, name: &str, sig: &str) -> Option<FieldId> {
        self.with_classes(|c| c.find_static_field(class.into(), name, sig))
            .map(|(owner, index)| FieldId(STATIC_FIELD | pack(owner, index)))
    }

    fn register_native(&self, class: ClassRef, name: &str, sig: &str, method: NativeMethod) -> BridgeResult<()> {
        let class: ClassId = class.into();
        let found = self.with_classes(|c| {
            c.find_method(class, name, sig, false)
                .or_else(|| c.find_method(class, name, sig, true))
        });
        let (owner, index) = found.ok_or_else(|| VmError::MethodNotFound {
            class: self.class(class).map(|c| c.name.clone()).unwrap_or_default(),
            name: name.to_string(),
            sig: sig.to_string(),
        })?;
        let owner = self.class(owner)?;
        if !owner.methods[index].bind(method) {
            return Err(BridgeError::Runtime(format!("{}.{}{} is not native", owner.name, name, sig)));
        }
        tracing::trace!(class = %owner.name, name, sig, "native bound");
        Ok(())
    }

    fn new_object(&self, class: ClassRef, ctor: MethodId, args: &[ManagedValue]) -> BridgeResult<Option<ObjRef>> {
        let _entered = self.enter();
        let (owner, index) = self.method_of(ctor)?;
        if owner.id != ClassId::from(class) || owner.methods[index].name != CONSTRUCTOR {
            return Err(BridgeError::Runtime(format!("method id {:#x} is not a constructor of {}", ctor.0, owner.name)));
        }
        let args = self.values(args)?;
        let obj = self.alloc(owner.id, Payload::None)?;
        match self.invoke(owner.id, index, Some(obj), &args) {
            Ok(_) => Ok(Some(self.refs.new_local(obj)?)),
            Err(raise) => self.finish(Err(raise)).map(|_| None),
        }
    }

    fn call_method(&self, obj: ObjRef, method: MethodId, args: &[ManagedValue]) -> BridgeResult<ManagedValue> {
        let _entered = self.enter();
        let this = self.refs.resolve(obj)?;
        let (declared, index) = self.method_of(method)?;
        let decl = &declared.methods[index];
        if decl.is_static {
            return Err(BridgeError::Runtime(format!("{}.{} is static", declared.name, decl.name)));
        }
        let (owner, index) = if decl.name == CONSTRUCTOR {
            (declared.id, index)
        } else {
            let runtime = self.runtime_class(this)?;
            self.with_classes(|c| c.find_virtual(runtime, &decl.name, &decl.sig))
                .unwrap_or((declared.id, index))
        };
        let args = self.values(args)?;
        self.finish(self.invoke(owner, index, Some(this), &args))
    }

    fn call_static(&self, class: ClassRef, method: MethodId, args: &[ManagedValue]) -> BridgeResult<ManagedValue> {
        let _entered = self.enter();
        let (owner, index) = self.method_of(method)?;
        if !owner.methods[index].is_static {
            return Err(BridgeError::Runtime(format!(
                "{}.{} is not static (called through {})",
                owner.name,
                owner.methods[index].name,
                self.class_name(class)
            )));
        }
        let args = self.values(args)?;
        self.finish(self.invoke(owner.id, index, None, &args))
    }

    fn get_field(&self, obj: ObjRef, field: FieldId) -> BridgeResult<ManagedValue> {
        let _entered = self.enter();
        if field.0 & STATIC_FIELD != 0 {
            return Err(BridgeError::Runtime("static field id used on an instance".into()));
        }
        let (_, slot) = unpack(field.0);
        let id = self.refs.resolve(obj)?;
        let value = {
            let heap = self.heap.lock();
            let object = heap.get(id)?;
            *object
                .fields
                .get(slot)
                .ok_or_else(|| BridgeError::Runtime(format!("invalid field id {:#x}", field.0)))?
        };
        Ok(self.to_managed(value)?)
    }

    fn set_field(&self, obj: ObjRef, field: FieldId, value: ManagedValue) -> BridgeResult<()> {
        let _entered = self.enter();
        if field.0 & STATIC_FIELD != 0 {
            return Err(BridgeError::Runtime("static field id used on an instance".into()));
        }
        let (_, slot) = unpack(field.0);
        let id = self.refs.resolve(obj)?;
        let value = self.from_managed(value)?;
        let mut heap = self.heap.lock();
        let target = heap
            .get_mut(id)?
            .fields
            .get_mut(slot)
            .ok_or_else(|| BridgeError::Runtime(format!("invalid field id {:#x}", field.0)))?;
        *target = value;
        Ok(())
    }

    fn get_static_field(&self, _class: ClassRef, field: FieldId) -> BridgeResult<ManagedValue> {
        let _entered = self.enter();
        let (owner, index) = unpack(field.0);
        let value = self
            .class(owner)?
            .static_value(index)
            .ok_or_else(|| BridgeError::Runtime(format!("invalid static field id {:#x}", field.0)))?;
        Ok(self.to_managed(value)?)
    }

    fn set_static_field(&self, _class: ClassRef, field: FieldId, value: ManagedValue) -> BridgeResult<()> {
        let _entered = self.enter();
        let (owner, index) = unpack(field.0);
        let value = self.from_managed(value)?;
        if self.class(owner)?.set_static(index, value) {
            Ok(())
        } else {
            Err(BridgeError::Runtime(format!("invalid static field id {:#x}", field.0)))
        }
    }

    fn new_string(&self, s: &str) -> BridgeResult<ObjRef> {
        let _entered = self.enter();
        Ok(self.refs.new_local(self.alloc_string(s)?)?)
    }

    fn read_string(&self, obj: ObjRef) -> BridgeResult<String> {
        let _entered = self.enter();
        Ok(self.string_of(self.refs.resolve(obj)?)?)
    }

    fn new_byte_array(&self, bytes: &[u8]) -> BridgeResult<ObjRef> {
        let _entered = self.enter();
        Ok(self.refs.new_local(self.alloc_bytes(bytes)?)?)
    }

    fn read_byte_array(&self, obj: ObjRef) -> BridgeResult<Vec<u8>> {
        let _entered = self.enter();
        Ok(self.bytes_of(self.refs.resolve(obj)?)?)
    }

    fn new_local_ref(&self, obj: ObjRef) -> BridgeResult<ObjRef> {
        let _entered = self.enter();
        Ok(self.refs.new_local(self.refs.resolve(obj)?)?)
    }

    fn delete_local_ref(&self, obj: ObjRef) {
        if !obj.is_global() {
            self.refs.delete(obj);
        }
    }

    fn new_global_ref(&self, obj: ObjRef) -> BridgeResult<ObjRef> {
        let _entered = self.enter();
        Ok(self.refs.new_global(self.refs.resolve(obj)?)?)
    }

    fn delete_global_ref(&self, obj: ObjRef) {
        if obj.is_global() {
            self.refs.delete(obj);
        }
    }

    fn is_same_object(&self, a: Option<ObjRef>, b: Option<ObjRef>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => match (self.refs.resolve(a), self.refs.resolve(b)) {
                (Ok(x), Ok(y)) => x == y,
                _ => false,
            },
            _ => false,
        }
    }

    fn throw(&self, throwable: ObjRef) -> BridgeResult<()> {
        let _entered = self.enter();
        let id = self.refs.resolve(throwable)?;
        if !self.instance_of(id, THROWABLE)? {
            return Err(BridgeError::Runtime(format!("{} is not throwable", self.class_name_of(id)?)));
        }
        self.pending.insert(thread::current().id(), id);
        Ok(())
    }

    fn take_exception(&self) -> Option<ObjRef> {
        let _entered = self.enter();
        let (_, thrown) = self.pending.remove(&thread::current().id())?;
        self.refs.new_local(thrown).ok()
    }

    fn exception_pending(&self) -> bool {
        self.pending.contains_key(&thread::current().id())
    }
}

//! Method invocation and object helpers for method bodies
//!
//! Managed bodies run on the calling thread with the world lock held, so
//! the [`HeapId`]s they see stay valid until they return. A throw travels
//! as [`Raise::Throw`] through `?` until it reaches the boundary, where it
//! becomes the thread's pending exception.

use std::cell::Cell;
use std::sync::Arc;

use peerlink::classes as names;
use peerlink::{ManagedValue, NativeCall, NativeMethod, ObjRef};

use super::Vm;
use crate::object::{HeapId, HeapObject, Payload};
use crate::types::{ClassId, MethodBody, CONSTRUCTOR};
use crate::value::Value;
use crate::{VmError, VmResult};

/// Body of a managed method
pub type ManagedFn = Arc<dyn Fn(&Vm, &Invocation<'_>) -> Result<Value, Raise> + Send + Sync>;

/// Abrupt completion of a managed call
#[derive(Debug, Clone, PartialEq)]
pub enum Raise {
    /// A managed exception object is being thrown
    Throw(HeapId),
    /// The VM itself failed
    Fault(VmError),
}

impl From<VmError> for Raise {
    fn from(e: VmError) -> Self {
        Raise::Fault(e)
    }
}

/// Receiver and arguments of a managed call
#[derive(Debug)]
pub struct Invocation<'a> {
    /// Receiver, `None` for static methods
    pub this: Option<HeapId>,
    /// Class declaring the running method
    pub class: ClassId,
    /// Arguments
    pub args: &'a [Value],
}

fn bad_arg(index: usize, expected: &str, got: Value) -> Raise {
    Raise::Fault(VmError::TypeError(format!(
        "argument {}: expected {}, got {}",
        index,
        expected,
        got.type_name()
    )))
}

impl Invocation<'_> {
    /// Receiver of an instance method
    pub fn this(&self) -> Result<HeapId, Raise> {
        self.this.ok_or(Raise::Fault(VmError::NullPointer))
    }

    /// Argument `index` (`Void` when absent)
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).copied().unwrap_or_default()
    }

    /// Object argument, `None` for null
    pub fn object(&self, index: usize) -> Result<Option<HeapId>, Raise> {
        match self.arg(index) {
            Value::Ref(id) => Ok(id),
            other => Err(bad_arg(index, "object", other)),
        }
    }

    /// Boolean argument
    pub fn bool(&self, index: usize) -> Result<bool, Raise> {
        let v = self.arg(index);
        v.as_bool().ok_or_else(|| bad_arg(index, "boolean", v))
    }

    /// Integer argument
    pub fn int(&self, index: usize) -> Result<i32, Raise> {
        let v = self.arg(index);
        v.as_int().ok_or_else(|| bad_arg(index, "int", v))
    }

    /// Long argument
    pub fn long(&self, index: usize) -> Result<i64, Raise> {
        let v = self.arg(index);
        v.as_long().ok_or_else(|| bad_arg(index, "long", v))
    }

    /// Floating-point argument
    pub fn double(&self, index: usize) -> Result<f64, Raise> {
        let v = self.arg(index);
        v.as_double().ok_or_else(|| bad_arg(index, "double", v))
    }
}

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct DepthGuard;

impl DepthGuard {
    fn enter(max: usize) -> VmResult<Self> {
        CALL_DEPTH.with(|depth| {
            if depth.get() >= max {
                return Err(VmError::StackOverflow);
            }
            depth.set(depth.get() + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

struct NativeFrame<'v>(&'v Vm);

impl Drop for NativeFrame<'_> {
    fn drop(&mut self) {
        self.0.refs.pop_frame();
    }
}

impl Vm {
    // ========================================================================
    // Invocation
    // ========================================================================

    pub(crate) fn invoke(
        &self,
        owner: ClassId,
        index: usize,
        this: Option<HeapId>,
        args: &[Value],
    ) -> Result<Value, Raise> {
        let class = self.class(owner)?;
        let method = class.methods.get(index).ok_or_else(|| VmError::MethodNotFound {
            class: class.name.clone(),
            name: format!("#{}", index),
            sig: String::new(),
        })?;
        let _depth = DepthGuard::enter(self.options.max_call_depth)?;
        match &method.body {
            MethodBody::Managed(body) => body(self, &Invocation { this, class: owner, args }),
            MethodBody::Native(_) => {
                let native = method.native().ok_or_else(|| {
                    VmError::UnboundNative(format!("{}.{}{}", class.name, method.name, method.sig))
                })?;
                self.call_native(&native, owner, this, args)
            }
            MethodBody::Abstract => Err(VmError::AbstractMethod(format!(
                "{}.{}{}",
                class.name, method.name, method.sig
            ))
            .into()),
        }
    }

    fn call_native(
        &self,
        native: &NativeMethod,
        class: ClassId,
        this: Option<HeapId>,
        args: &[Value],
    ) -> Result<Value, Raise> {
        self.refs.push_frame();
        let frame = NativeFrame(self);
        let this = this.map(|id| self.refs.new_local(id)).transpose()?;
        let args = args
            .iter()
            .map(|v| self.to_managed(*v))
            .collect::<VmResult<Vec<_>>>()?;
        let returned = native(&NativeCall {
            this,
            class: class.into(),
            args: &args,
        });
        let value = self.from_managed(returned);
        drop(frame);
        if let Some((_, thrown)) = self.pending.remove(&std::thread::current().id()) {
            return Err(Raise::Throw(thrown));
        }
        Ok(value?)
    }

    pub(crate) fn to_managed(&self, value: Value) -> VmResult<ManagedValue> {
        Ok(match value {
            Value::Void => ManagedValue::void(),
            Value::Bool(b) => ManagedValue::bool(b),
            Value::Byte(b) => ManagedValue::byte(b),
            Value::Char(c) => ManagedValue::char(c),
            Value::Short(s) => ManagedValue::short(s),
            Value::Int(i) => ManagedValue::int(i),
            Value::Long(l) => ManagedValue::long(l),
            Value::Float(f) => ManagedValue::float(f),
            Value::Double(d) => ManagedValue::double(d),
            Value::Ref(None) => ManagedValue::null(),
            Value::Ref(Some(id)) => ManagedValue::object(Some(self.refs.new_local(id)?)),
        })
    }

    pub(crate) fn from_managed(&self, value: ManagedValue) -> VmResult<Value> {
        if value.is_void() {
            return Ok(Value::Void);
        }
        if let Some(obj) = value.as_object() {
            return Ok(Value::Ref(obj.map(|r| self.refs.resolve(r)).transpose()?));
        }
        let scalar = value
            .as_bool()
            .map(Value::Bool)
            .or_else(|| value.as_byte().map(Value::Byte))
            .or_else(|| value.as_char().map(Value::Char))
            .or_else(|| value.as_short().map(Value::Short))
            .or_else(|| value.as_int().map(Value::Int))
            .or_else(|| value.as_long().map(Value::Long))
            .or_else(|| value.as_float().map(Value::Float))
            .or_else(|| value.as_double().map(Value::Double));
        scalar.ok_or_else(|| VmError::TypeError(format!("unknown value tag {}", value.tag())))
    }

    /// Call an instance method with virtual dispatch
    pub fn call_virtual(&self, this: HeapId, name: &str, sig: &str, args: &[Value]) -> Result<Value, Raise> {
        let class = self.runtime_class(this)?;
        let (owner, index) = self
            .with_classes(|c| c.find_virtual(class, name, sig))
            .ok_or_else(|| self.method_not_found(class, name, sig))?;
        self.invoke(owner, index, Some(this), args)
    }

    /// Call a static method by class path
    pub fn call_static_named(&self, class: &str, name: &str, sig: &str, args: &[Value]) -> Result<Value, Raise> {
        let class = self.class_named(class)?;
        let (owner, index) = self
            .with_classes(|c| c.find_method(class.id, name, sig, true))
            .ok_or_else(|| self.method_not_found(class.id, name, sig))?;
        self.invoke(owner, index, None, args)
    }

    /// Call the constructor `sig` of `class` on an already allocated object
    pub fn invoke_special(&self, class: &str, sig: &str, this: HeapId, args: &[Value]) -> Result<Value, Raise> {
        let class = self.class_named(class)?;
        let index = class
            .declared_method(CONSTRUCTOR, sig, false)
            .ok_or_else(|| self.method_not_found(class.id, CONSTRUCTOR, sig))?;
        self.invoke(class.id, index, Some(this), args)
    }

    /// Allocate an instance of `class` and run its constructor `sig`
    pub fn construct(&self, class: &str, sig: &str, args: &[Value]) -> Result<HeapId, Raise> {
        let id = self.alloc(self.class_named(class)?.id, Payload::None)?;
        self.invoke_special(class, sig, id, args)?;
        Ok(id)
    }

    fn method_not_found(&self, class: ClassId, name: &str, sig: &str) -> VmError {
        VmError::MethodNotFound {
            class: self.class(class).map(|c| c.name.clone()).unwrap_or_default(),
            name: name.to_string(),
            sig: sig.to_string(),
        }
    }

    // ========================================================================
    // Exceptions
    // ========================================================================

    /// A new throwable of `class`, ready to be returned from a body
    pub fn throw_new(&self, class: &str, message: Option<&str>) -> Raise {
        let thrown = match message {
            Some(message) => self
                .alloc_string(message)
                .map_err(Raise::from)
                .and_then(|msg| self.construct(class, names::MESSAGE_CTOR, &[Value::object(msg)])),
            None => self.construct(class, "()V", &[]),
        };
        match thrown {
            Ok(id) => Raise::Throw(id),
            Err(raise) => raise,
        }
    }

    /// A `NullPointerException`
    pub fn npe(&self) -> Raise {
        self.throw_new(crate::builtin::NULL_POINTER_EXCEPTION, None)
    }

    /// Non-null object or a thrown `NullPointerException`
    pub fn non_null(&self, id: Option<HeapId>) -> Result<HeapId, Raise> {
        id.ok_or_else(|| self.npe())
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Allocate an object of `class` with zeroed fields
    pub fn alloc(&self, class: ClassId, payload: Payload) -> VmResult<HeapId> {
        let fields = self.class(class)?.initial_fields();
        let id = self.heap.lock().alloc(HeapObject::new(class, fields, payload));
        self.since_gc.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(id)
    }

    /// Allocate a managed string
    pub fn alloc_string(&self, s: &str) -> VmResult<HeapId> {
        self.alloc(self.class_named(names::STRING)?.id, Payload::Str(s.to_string()))
    }

    /// Allocate a managed byte array
    pub fn alloc_bytes(&self, bytes: &[u8]) -> VmResult<HeapId> {
        self.alloc(self.class_named(names::BYTE_ARRAY)?.id, Payload::Bytes(bytes.to_vec()))
    }

    /// Contents of a managed string
    pub fn string_of(&self, id: HeapId) -> VmResult<String> {
        match &self.heap.lock().get(id)?.payload {
            Payload::Str(s) => Ok(s.clone()),
            _ => Err(VmError::TypeError(format!("{} is not a string", id))),
        }
    }

    /// Contents of a nullable string value
    pub fn opt_string(&self, value: Value) -> VmResult<Option<String>> {
        value.as_ref_id().map(|id| self.string_of(id)).transpose()
    }

    /// Contents of a managed byte array
    pub fn bytes_of(&self, id: HeapId) -> VmResult<Vec<u8>> {
        match &self.heap.lock().get(id)?.payload {
            Payload::Bytes(b) => Ok(b.clone()),
            _ => Err(VmError::TypeError(format!("{} is not a byte array", id))),
        }
    }

    /// Runtime class of an object
    pub fn runtime_class(&self, id: HeapId) -> VmResult<ClassId> {
        Ok(self.heap.lock().get(id)?.class)
    }

    /// Class path of an object's runtime class
    pub fn class_name_of(&self, id: HeapId) -> VmResult<String> {
        Ok(self.class(self.runtime_class(id)?)?.name.clone())
    }

    /// Whether `id` is an instance of the class at `class` (false if unknown)
    pub fn instance_of(&self, id: HeapId, class: &str) -> VmResult<bool> {
        let runtime = self.runtime_class(id)?;
        Ok(self.with_classes(|c| {
            c.lookup(class)
                .map_or(false, |target| c.is_subclass(runtime, target.id))
        }))
    }

    fn field_slot(&self, id: HeapId, name: &str) -> VmResult<usize> {
        let class = self.class(self.runtime_class(id)?)?;
        class.field_slot(name).ok_or_else(|| VmError::FieldNotFound {
            class: class.name.clone(),
            name: name.to_string(),
        })
    }

    /// Read an instance field by name
    pub fn field(&self, id: HeapId, name: &str) -> VmResult<Value> {
        let slot = self.field_slot(id, name)?;
        Ok(self.heap.lock().get(id)?.fields[slot])
    }

    /// Write an instance field by name
    pub fn put_field(&self, id: HeapId, name: &str, value: Value) -> VmResult<()> {
        let slot = self.field_slot(id, name)?;
        self.heap.lock().get_mut(id)?.fields[slot] = value;
        Ok(())
    }

    /// Read or update an object's builtin state
    pub fn with_payload<R>(&self, id: HeapId, f: impl FnOnce(&mut Payload) -> R) -> VmResult<R> {
        Ok(f(&mut self.heap.lock().get_mut(id)?.payload))
    }

    /// Value equality through the virtual `equals`
    pub fn values_equal(&self, a: Value, b: Value) -> Result<bool, Raise> {
        match (a, b) {
            (Value::Ref(None), Value::Ref(None)) => Ok(true),
            (Value::Ref(Some(x)), Value::Ref(Some(y))) if x == y => Ok(true),
            (Value::Ref(Some(x)), other @ Value::Ref(Some(_))) => {
                let eq = self.call_virtual(x, "equals", "(Lvm/lang/Object;)Z", &[other])?;
                Ok(eq.as_bool().unwrap_or(false))
            }
            (Value::Ref(_), _) | (_, Value::Ref(_)) => Ok(false),
            (Value::Float(x), Value::Float(y)) => Ok(x.to_bits() == y.to_bits()),
            (Value::Double(x), Value::Double(y)) => Ok(x.to_bits() == y.to_bits()),
            (x, y) => Ok(x == y),
        }
    }

    /// Hash through the virtual `hashCode` (0 for null)
    pub fn hash_of(&self, value: Value) -> Result<i32, Raise> {
        match value {
            Value::Ref(None) => Ok(0),
            Value::Ref(Some(id)) => Ok(self.call_virtual(id, "hashCode", "()I", &[])?.as_int().unwrap_or(0)),
            Value::Long(l) => Ok((l ^ (l >> 32)) as i32),
            Value::Double(d) => {
                let bits = d.to_bits() as i64;
                Ok((bits ^ (bits >> 32)) as i32)
            }
            Value::Float(f) => Ok(f.to_bits() as i32),
            Value::Bool(b) => Ok(if b { 1231 } else { 1237 }),
            other => Ok(other.as_int().unwrap_or(0)),
        }
    }

    // ========================================================================
    // Pinning
    // ========================================================================

    /// Keep `id` alive beyond the current call, e.g. for another thread
    pub fn pin(&self, id: HeapId) -> VmResult<ObjRef> {
        self.refs.new_global(id)
    }

    /// Object behind a pin
    pub fn pinned(&self, pin: ObjRef) -> VmResult<HeapId> {
        self.refs.resolve(pin)
    }

    /// Release a pin
    pub fn unpin(&self, pin: ObjRef) {
        self.refs.delete(pin);
    }
}

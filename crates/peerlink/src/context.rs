//! Abstract managed-runtime operations
//!
//! Defines the interface a managed runtime implements so the bridge can
//! reach it. The bridge programs only against this trait; `peerlink-vm`
//! ships the reference implementation.
//!
//! # Exceptions
//!
//! Calls that execute managed code (`new_object`, `call_method`,
//! `call_static`) follow the pending-exception model: a managed throw does
//! not produce an `Err`, it leaves an exception pending on the calling
//! thread, which the caller collects with [`ManagedEnv::take_exception`].
//! `Err` is reserved for misuse of the interface itself (dead references,
//! wrong slot kinds) and runtime faults.
//!
//! # References
//!
//! Every `ObjRef` returned by this trait is a fresh *local* reference that
//! the caller owns and must delete. While a native method registered with
//! [`ManagedEnv::register_native`] runs, locals it creates are also released
//! automatically when it returns.

use std::sync::Arc;

use crate::error::BridgeResult;
use crate::value::{ClassRef, FieldId, ManagedValue, MethodId, ObjRef};

/// Arguments of a native method invoked by managed code.
#[derive(Debug)]
pub struct NativeCall<'a> {
    /// Receiver for instance methods (a local reference), `None` for statics
    pub this: Option<ObjRef>,
    /// Class the native method was registered on
    pub class: ClassRef,
    /// Declared arguments, object slots as local references
    pub args: &'a [ManagedValue],
}

/// Native implementation of a managed method.
///
/// Returning normally with an exception pending (see
/// [`ManagedEnv::throw`]) makes the managed caller observe the throw.
pub type NativeMethod = Arc<dyn Fn(&NativeCall<'_>) -> ManagedValue + Send + Sync>;

/// Abstract managed runtime.
///
/// Implementations must be free-threaded: every method may be called from
/// any native thread, concurrently.
pub trait ManagedEnv: Send + Sync {
    // ========================================================================
    // Classes and members
    // ========================================================================

    /// Find a class by its slash-separated path
    fn find_class(&self, name: &str) -> Option<ClassRef>;

    /// Path of a class
    fn class_name(&self, class: ClassRef) -> String;

    /// Runtime class of an object
    fn class_of(&self, obj: ObjRef) -> BridgeResult<ClassRef>;

    /// Whether `obj` is an instance of `class` (subclasses and interfaces included)
    fn is_instance_of(&self, obj: ObjRef, class: ClassRef) -> BridgeResult<bool>;

    /// Instance method (or constructor, named `<init>`) by name and signature
    fn method_id(&self, class: ClassRef, name: &str, sig: &str) -> Option<MethodId>;

    /// Static method by name and signature
    fn static_method_id(&self, class: ClassRef, name: &str, sig: &str) -> Option<MethodId>;

    /// Instance field by name and type signature
    fn field_id(&self, class: ClassRef, name: &str, sig: &str) -> Option<FieldId>;

    /// Static field by name and type signature
    fn static_field_id(&self, class: ClassRef, name: &str, sig: &str) -> Option<FieldId>;

    /// Bind the implementation of a method declared `native`
    fn register_native(
        &self,
        class: ClassRef,
        name: &str,
        sig: &str,
        method: NativeMethod,
    ) -> BridgeResult<()>;

    // ========================================================================
    // Objects and calls
    // ========================================================================

    /// Allocate and construct an object. `Ok(None)` when the constructor threw.
    fn new_object(
        &self,
        class: ClassRef,
        ctor: MethodId,
        args: &[ManagedValue],
    ) -> BridgeResult<Option<ObjRef>>;

    /// Call an instance method with virtual dispatch
    fn call_method(
        &self,
        obj: ObjRef,
        method: MethodId,
        args: &[ManagedValue],
    ) -> BridgeResult<ManagedValue>;

    /// Call a static method
    fn call_static(
        &self,
        class: ClassRef,
        method: MethodId,
        args: &[ManagedValue],
    ) -> BridgeResult<ManagedValue>;

    /// Read an instance field
    fn get_field(&self, obj: ObjRef, field: FieldId) -> BridgeResult<ManagedValue>;

    /// Write an instance field
    fn set_field(&self, obj: ObjRef, field: FieldId, value: ManagedValue) -> BridgeResult<()>;

    /// Read a static field
    fn get_static_field(&self, class: ClassRef, field: FieldId) -> BridgeResult<ManagedValue>;

    /// Write a static field
    fn set_static_field(
        &self,
        class: ClassRef,
        field: FieldId,
        value: ManagedValue,
    ) -> BridgeResult<()>;

    // ========================================================================
    // Strings and arrays
    // ========================================================================

    /// Allocate a managed string
    fn new_string(&self, s: &str) -> BridgeResult<ObjRef>;

    /// Read a managed string
    fn read_string(&self, obj: ObjRef) -> BridgeResult<String>;

    /// Allocate a managed byte array holding a copy of `bytes`
    fn new_byte_array(&self, bytes: &[u8]) -> BridgeResult<ObjRef>;

    /// Copy the contents of a managed byte array
    fn read_byte_array(&self, obj: ObjRef) -> BridgeResult<Vec<u8>>;

    // ========================================================================
    // References
    // ========================================================================

    /// New local reference to the referent of `obj`
    fn new_local_ref(&self, obj: ObjRef) -> BridgeResult<ObjRef>;

    /// Delete a local reference. Unknown references are ignored.
    fn delete_local_ref(&self, obj: ObjRef);

    /// New global reference to the referent of `obj`
    fn new_global_ref(&self, obj: ObjRef) -> BridgeResult<ObjRef>;

    /// Delete a global reference. Unknown references are ignored.
    fn delete_global_ref(&self, obj: ObjRef);

    /// Whether two references name the same object (both null counts as same)
    fn is_same_object(&self, a: Option<ObjRef>, b: Option<ObjRef>) -> bool;

    // ========================================================================
    // Exceptions
    // ========================================================================

    /// Make `throwable` the pending exception of the calling thread
    fn throw(&self, throwable: ObjRef) -> BridgeResult<()>;

    /// Take and clear the calling thread's pending exception
    fn take_exception(&self) -> Option<ObjRef>;

    /// Whether the calling thread has an exception pending
    fn exception_pending(&self) -> bool;
}

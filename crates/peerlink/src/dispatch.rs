//! Call dispatch in both directions
//!
//! Native → managed: resolve identifiers through the registry, convert
//! arguments, call, convert the result, and surface a managed throw as
//! [`BridgeError::Thrown`].
//!
//! Managed → native: [`Bridge::export_instance`] and
//! [`Bridge::export_static`] bind Rust closures to methods the managed side
//! declares `native`. Errors and panics raised by the closure are thrown into
//! the managed caller.

use std::any::Any;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::bridge::Bridge;
use crate::completion::Completion;
use crate::context::{NativeCall, NativeMethod};
use crate::convert::{Argument, Bridgeable, Parameter};
use crate::error::{BridgeError, BridgeResult, ThrownError, FATAL_ERROR, RUNTIME_EXCEPTION};
use crate::options::MarshalOptions;
use crate::refs::LocalRef;
use crate::value::{ManagedValue, ObjRef};

// ============================================================================
// Native → managed, raw slots
// ============================================================================

impl Bridge {
    /// Call an instance method with raw slots
    pub fn call_method_raw(
        &self,
        target: ObjRef,
        class: &str,
        name: &str,
        sig: &str,
        args: &[ManagedValue],
    ) -> BridgeResult<ManagedValue> {
        let method = self.describe(class)?.method(self.env(), name, sig)?;
        self.trace_crossing("to-managed", class, name);
        let value = self.env().call_method(target, method, args)?;
        self.check_exception()?;
        Ok(value)
    }

    /// Call a static method with raw slots
    pub fn call_static_raw(
        &self,
        class: &str,
        name: &str,
        sig: &str,
        args: &[ManagedValue],
    ) -> BridgeResult<ManagedValue> {
        let signature = self.describe(class)?;
        let method = signature.static_method(self.env(), name, sig)?;
        self.trace_crossing("to-managed", class, name);
        let value = self.env().call_static(signature.class(), method, args)?;
        self.check_exception()?;
        Ok(value)
    }

    /// Construct a managed object with raw slots
    pub fn new_object_raw(
        &self,
        class: &str,
        sig: &str,
        args: &[ManagedValue],
    ) -> BridgeResult<LocalRef<'_>> {
        let signature = self.describe(class)?;
        let ctor = signature.constructor(self.env(), sig)?;
        self.trace_crossing("to-managed", class, "<init>");
        match self.env().new_object(signature.class(), ctor, args)? {
            Some(obj) => Ok(self.local(obj)),
            None => {
                self.check_exception()?;
                Err(BridgeError::Runtime(format!("constructor of `{}` produced no object", class)))
            }
        }
    }

    /// Read an instance field with a raw slot
    pub fn get_field_raw(&self, target: ObjRef, class: &str, name: &str, sig: &str) -> BridgeResult<ManagedValue> {
        let field = self.describe(class)?.field(self.env(), name, sig)?;
        self.env().get_field(target, field)
    }

    /// Write an instance field with a raw slot
    pub fn set_field_raw(
        &self,
        target: ObjRef,
        class: &str,
        name: &str,
        sig: &str,
        value: ManagedValue,
    ) -> BridgeResult<()> {
        let field = self.describe(class)?.field(self.env(), name, sig)?;
        self.env().set_field(target, field, value)
    }

    /// Read a static field with a raw slot
    pub fn get_static_field_raw(&self, class: &str, name: &str, sig: &str) -> BridgeResult<ManagedValue> {
        let signature = self.describe(class)?;
        let field = signature.static_field(self.env(), name, sig)?;
        self.env().get_static_field(signature.class(), field)
    }

    /// Write a static field with a raw slot
    pub fn set_static_field_raw(&self, class: &str, name: &str, sig: &str, value: ManagedValue) -> BridgeResult<()> {
        let signature = self.describe(class)?;
        let field = signature.static_field(self.env(), name, sig)?;
        self.env().set_static_field(signature.class(), field, value)
    }
}

// ============================================================================
// Native → managed, converted
// ============================================================================

impl Bridge {
    fn parameters<'b>(&'b self, args: &[&dyn Argument], options: MarshalOptions) -> BridgeResult<Vec<Parameter<'b>>> {
        args.iter().map(|arg| Argument::to_parameter(*arg, self, options)).collect()
    }

    fn convert_result<R: Bridgeable>(&self, value: ManagedValue, options: MarshalOptions) -> BridgeResult<R> {
        let _guard = self.adopt(value);
        R::from_value(self, value, options)
    }

    /// Call a managed instance method
    pub fn call_method<R: Bridgeable>(
        &self,
        target: ObjRef,
        class: &str,
        name: &str,
        sig: &str,
        args: &[&dyn Argument],
        options: MarshalOptions,
    ) -> BridgeResult<R> {
        let params = self.parameters(args, options)?;
        let values: Vec<ManagedValue> = params.iter().map(Parameter::value).collect();
        let result = self.call_method_raw(target, class, name, sig, &values)?;
        self.convert_result(result, options)
    }

    /// Call a managed static method
    pub fn call_static<R: Bridgeable>(
        &self,
        class: &str,
        name: &str,
        sig: &str,
        args: &[&dyn Argument],
        options: MarshalOptions,
    ) -> BridgeResult<R> {
        let params = self.parameters(args, options)?;
        let values: Vec<ManagedValue> = params.iter().map(Parameter::value).collect();
        let result = self.call_static_raw(class, name, sig, &values)?;
        self.convert_result(result, options)
    }

    /// Construct a managed object
    pub fn new_object(
        &self,
        class: &str,
        sig: &str,
        args: &[&dyn Argument],
        options: MarshalOptions,
    ) -> BridgeResult<LocalRef<'_>> {
        let params = self.parameters(args, options)?;
        let values: Vec<ManagedValue> = params.iter().map(Parameter::value).collect();
        self.new_object_raw(class, sig, &values)
    }

    /// Call a managed instance method that reports its result through a
    /// trailing `Lbridge/kt/Completion;` parameter. `sig` is the full
    /// managed signature, completion parameter included.
    pub fn call_method_async<R>(
        &self,
        target: ObjRef,
        class: &str,
        name: &str,
        sig: &str,
        args: &[&dyn Argument],
        options: MarshalOptions,
    ) -> BridgeResult<Completion<R>>
    where
        R: Bridgeable + Send + 'static,
    {
        let params = self.parameters(args, options)?;
        let (completion, callback) = self.completion_callback::<R>(options)?;
        let mut values: Vec<ManagedValue> = params.iter().map(Parameter::value).collect();
        values.push(callback.value());
        let result = self.call_method_raw(target, class, name, sig, &values)?;
        drop(self.adopt(result));
        Ok(completion)
    }

    /// Static counterpart of [`Bridge::call_method_async`]
    pub fn call_static_async<R>(
        &self,
        class: &str,
        name: &str,
        sig: &str,
        args: &[&dyn Argument],
        options: MarshalOptions,
    ) -> BridgeResult<Completion<R>>
    where
        R: Bridgeable + Send + 'static,
    {
        let params = self.parameters(args, options)?;
        let (completion, callback) = self.completion_callback::<R>(options)?;
        let mut values: Vec<ManagedValue> = params.iter().map(Parameter::value).collect();
        values.push(callback.value());
        let result = self.call_static_raw(class, name, sig, &values)?;
        drop(self.adopt(result));
        Ok(completion)
    }

    /// Read a managed instance field
    pub fn get_field<R: Bridgeable>(
        &self,
        target: ObjRef,
        class: &str,
        name: &str,
        sig: &str,
        options: MarshalOptions,
    ) -> BridgeResult<R> {
        let value = self.get_field_raw(target, class, name, sig)?;
        self.convert_result(value, options)
    }

    /// Write a managed instance field
    pub fn set_field(
        &self,
        target: ObjRef,
        class: &str,
        name: &str,
        sig: &str,
        value: &dyn Argument,
        options: MarshalOptions,
    ) -> BridgeResult<()> {
        let param = value.to_parameter(self, options)?;
        self.set_field_raw(target, class, name, sig, param.value())
    }

    /// Read a managed static field
    pub fn get_static_field<R: Bridgeable>(
        &self,
        class: &str,
        name: &str,
        sig: &str,
        options: MarshalOptions,
    ) -> BridgeResult<R> {
        let value = self.get_static_field_raw(class, name, sig)?;
        self.convert_result(value, options)
    }

    /// Write a managed static field
    pub fn set_static_field(
        &self,
        class: &str,
        name: &str,
        sig: &str,
        value: &dyn Argument,
        options: MarshalOptions,
    ) -> BridgeResult<()> {
        let param = value.to_parameter(self, options)?;
        self.set_static_field_raw(class, name, sig, param.value())
    }
}

// ============================================================================
// Managed → native
// ============================================================================

/// Failure of a native method, before translation into a managed throw
#[derive(Debug)]
pub enum Failure {
    /// Bridge failure: rethrown if it carries a managed throwable, fatal otherwise
    Bridge(BridgeError),
    /// Application error returned by exported code
    Native(Box<dyn Error + Send + Sync>),
}

impl From<BridgeError> for Failure {
    fn from(e: BridgeError) -> Self {
        Failure::Bridge(e)
    }
}

/// Arguments of a native method, with conversions
pub struct NativeArgs<'a> {
    bridge: &'a Bridge,
    call: &'a NativeCall<'a>,
    options: MarshalOptions,
}

impl<'a> NativeArgs<'a> {
    /// Wrap a native call
    pub fn new(bridge: &'a Bridge, call: &'a NativeCall<'a>, options: MarshalOptions) -> Self {
        Self { bridge, call, options }
    }

    /// The bridge
    pub fn bridge(&self) -> &'a Bridge {
        self.bridge
    }

    /// Conversion options the method was exported with
    pub fn options(&self) -> MarshalOptions {
        self.options
    }

    /// Number of declared arguments
    pub fn len(&self) -> usize {
        self.call.args.len()
    }

    /// Whether the method takes no arguments
    pub fn is_empty(&self) -> bool {
        self.call.args.is_empty()
    }

    /// Receiver, for instance methods
    pub fn this(&self) -> Option<ObjRef> {
        self.call.this
    }

    /// Raw slot
    pub fn value(&self, index: usize) -> BridgeResult<ManagedValue> {
        self.call.args.get(index).copied().ok_or_else(|| {
            BridgeError::InvalidValue(format!("argument {} of {} requested", index, self.call.args.len()))
        })
    }

    /// Converted argument
    pub fn get<A: Bridgeable>(&self, index: usize) -> BridgeResult<A> {
        A::from_value(self.bridge, self.value(index)?, self.options)
    }

    /// Native peer of an object argument
    pub fn peer<T: Any + Send + Sync>(&self, index: usize) -> BridgeResult<Arc<T>> {
        let obj = self
            .value(index)?
            .as_object()
            .flatten()
            .ok_or(BridgeError::NullHandle)?;
        self.bridge.peer_as::<T>(obj)
    }

    /// Native peer of the receiver
    pub fn this_peer<T: Any + Send + Sync>(&self) -> BridgeResult<Arc<T>> {
        let this = self
            .call
            .this
            .ok_or_else(|| BridgeError::InvalidValue("static call has no receiver".to_string()))?;
        self.bridge.peer_as::<T>(this)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "native panic".to_string()
    }
}

impl Bridge {
    /// Wrap `body` as a native method bound to this bridge. Failures and
    /// panics are thrown into the managed caller.
    pub fn native_method<F>(&self, label: impl Into<String>, body: F) -> NativeMethod
    where
        F: Fn(&Bridge, &NativeCall<'_>) -> Result<ManagedValue, Failure> + Send + Sync + 'static,
    {
        let weak = self.weak();
        let label = label.into();
        Arc::new(move |call: &NativeCall<'_>| {
            let Some(bridge) = weak.upgrade() else {
                tracing::warn!(method = %label, "native call after bridge shutdown");
                return ManagedValue::void();
            };
            bridge.trace_crossing("to-native", &label, "");
            match panic::catch_unwind(AssertUnwindSafe(|| body(&*bridge, call))) {
                Ok(Ok(value)) => value,
                Ok(Err(failure)) => {
                    bridge.raise(failure);
                    ManagedValue::void()
                }
                Err(payload) => {
                    let message = panic_message(&*payload);
                    tracing::error!(method = %label, %message, "panic in native method");
                    bridge.throw_new(FATAL_ERROR, &format!("panic: {}", message));
                    ManagedValue::void()
                }
            }
        })
    }

    /// Throw a failure into the managed caller
    pub fn raise(&self, failure: Failure) {
        match failure {
            Failure::Bridge(BridgeError::Thrown(thrown)) => self.throw_error(&thrown),
            Failure::Bridge(err) => {
                tracing::error!(error = %err, "bridge failure in native method");
                self.throw_new(FATAL_ERROR, &err.to_string());
            }
            Failure::Native(err) => {
                if let Some(thrown) = err.downcast_ref::<ThrownError>() {
                    self.throw_error(thrown);
                } else if let Some(BridgeError::Thrown(thrown)) = err.downcast_ref::<BridgeError>() {
                    self.throw_error(thrown);
                } else {
                    self.throw_new(RUNTIME_EXCEPTION, &err.to_string());
                }
            }
        }
    }

    fn throw_error(&self, thrown: &ThrownError) {
        let outcome = self
            .throwable_for(thrown)
            .and_then(|throwable| self.env().throw(throwable.obj()));
        if let Err(e) = outcome {
            tracing::error!(error = %e, "unable to raise managed exception");
        }
    }

    fn throw_new(&self, class: &str, message: &str) {
        let outcome = self
            .new_throwable(class, message)
            .and_then(|throwable| self.env().throw(throwable.obj()));
        if let Err(e) = outcome {
            tracing::error!(error = %e, class, "unable to raise managed exception");
        }
    }

    /// Bind a native instance method of a peer-backed class. The receiver's
    /// peer is resolved as `T` and handed to `f`.
    pub fn export_instance<T, R, E, F>(
        &self,
        class: &str,
        name: &str,
        sig: &str,
        options: MarshalOptions,
        f: F,
    ) -> BridgeResult<()>
    where
        T: Any + Send + Sync,
        R: Bridgeable,
        E: Into<Box<dyn Error + Send + Sync>>,
        F: Fn(&Arc<T>, &NativeArgs<'_>) -> Result<R, E> + Send + Sync + 'static,
    {
        let signature = self.describe(class)?;
        let method = self.native_method(format!("{}.{}", class, name), move |bridge, call| {
            let args = NativeArgs::new(bridge, call, options);
            let this = args.this_peer::<T>()?;
            let result = f(&this, &args).map_err(|e| Failure::Native(e.into()))?;
            Ok(Bridgeable::to_parameter(&result, bridge, options)?.into_return())
        });
        self.env().register_native(signature.class(), name, sig, method)
    }

    /// Bind a native static method
    pub fn export_static<R, E, F>(
        &self,
        class: &str,
        name: &str,
        sig: &str,
        options: MarshalOptions,
        f: F,
    ) -> BridgeResult<()>
    where
        R: Bridgeable,
        E: Into<Box<dyn Error + Send + Sync>>,
        F: Fn(&NativeArgs<'_>) -> Result<R, E> + Send + Sync + 'static,
    {
        let signature = self.describe(class)?;
        let method = self.native_method(format!("{}.{}", class, name), move |bridge, call| {
            let args = NativeArgs::new(bridge, call, options);
            let result = f(&args).map_err(|e| Failure::Native(e.into()))?;
            Ok(Bridgeable::to_parameter(&result, bridge, options)?.into_return())
        });
        self.env().register_native(signature.class(), name, sig, method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
        let payload: Box<dyn Any + Send> = Box::new(3u8);
        assert_eq!(panic_message(&*payload), "native panic");
    }
}

//! Native closures held by managed objects

use std::fmt;
use std::sync::Arc;

use crate::any::AnyValue;
use crate::bridge::Bridge;
use crate::classes;
use crate::error::BridgeResult;
use crate::handle::NativeObject;
use crate::refs::LocalRef;
use crate::value::{ManagedValue, ObjRef};

/// Zero-argument native closure behind a managed `bridge/kt/NativeClosure0`
pub struct NativeClosure {
    body: Box<dyn Fn() -> BridgeResult<AnyValue> + Send + Sync>,
}

impl NativeClosure {
    /// Wrap `body`
    pub fn new<F>(body: F) -> Self
    where
        F: Fn() -> BridgeResult<AnyValue> + Send + Sync + 'static,
    {
        Self { body: Box::new(body) }
    }

    /// Run the closure
    pub fn call(&self) -> BridgeResult<AnyValue> {
        (self.body)()
    }
}

impl fmt::Debug for NativeClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeClosure")
    }
}

impl Bridge {
    /// Managed `NativeClosure0` owning a retained handle to `body`
    pub fn new_closure<F>(&self, body: F) -> BridgeResult<LocalRef<'_>>
    where
        F: Fn() -> BridgeResult<AnyValue> + Send + Sync + 'static,
    {
        self.closure_object(Arc::new(NativeClosure::new(body)))
    }

    pub(crate) fn closure_object(&self, closure: Arc<NativeClosure>) -> BridgeResult<LocalRef<'_>> {
        let closure: NativeObject = closure;
        let handle = self.handles().handle_for(Some(&closure), true);
        self.new_object_raw(classes::NATIVE_CLOSURE, classes::PEER_CTOR, &[ManagedValue::long(handle.as_long())])
            .map_err(|e| {
                self.handles().release_abandoned(handle);
                e
            })
    }

    /// The native closure behind a managed `NativeClosure0`
    pub fn closure_of(&self, obj: ObjRef) -> BridgeResult<Arc<NativeClosure>> {
        self.peer_as::<NativeClosure>(obj)
    }
}

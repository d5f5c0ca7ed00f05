//! RAII wrappers for managed references

use std::fmt;
use std::sync::Arc;

use crate::context::ManagedEnv;
use crate::error::BridgeResult;
use crate::value::{ManagedValue, ObjRef};

// ============================================================================
// LocalRef
// ============================================================================

/// Owned local reference, deleted on drop.
pub struct LocalRef<'b> {
    env: &'b dyn ManagedEnv,
    obj: ObjRef,
}

impl<'b> LocalRef<'b> {
    /// Take ownership of a local reference
    pub fn new(env: &'b dyn ManagedEnv, obj: ObjRef) -> Self {
        Self { env, obj }
    }

    /// The reference itself
    #[inline]
    pub fn obj(&self) -> ObjRef {
        self.obj
    }

    /// As an object argument slot
    #[inline]
    pub fn value(&self) -> ManagedValue {
        ManagedValue::object(Some(self.obj))
    }

    /// Give up ownership without deleting
    pub fn into_raw(self) -> ObjRef {
        let obj = self.obj;
        std::mem::forget(self);
        obj
    }

    /// Promote to a global reference. The local is deleted.
    pub fn to_global(self, env: &Arc<dyn ManagedEnv>) -> BridgeResult<GlobalRef> {
        GlobalRef::new(env.clone(), self.obj)
    }
}

impl Drop for LocalRef<'_> {
    fn drop(&mut self) {
        if !self.obj.is_global() {
            self.env.delete_local_ref(self.obj);
        }
    }
}

impl fmt::Debug for LocalRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalRef({:?})", self.obj)
    }
}

/// Object slot of an optional local
pub fn object_value(local: Option<&LocalRef<'_>>) -> ManagedValue {
    ManagedValue::object(local.map(LocalRef::obj))
}

// ============================================================================
// GlobalRef
// ============================================================================

struct GlobalInner {
    env: Arc<dyn ManagedEnv>,
    obj: ObjRef,
}

impl Drop for GlobalInner {
    fn drop(&mut self) {
        self.env.delete_global_ref(self.obj);
    }
}

/// Shared global reference. The managed referent stays reachable until the
/// last clone is dropped.
#[derive(Clone)]
pub struct GlobalRef {
    inner: Arc<GlobalInner>,
}

impl GlobalRef {
    /// Create a global reference to the referent of `obj` (local or global)
    pub fn new(env: Arc<dyn ManagedEnv>, obj: ObjRef) -> BridgeResult<Self> {
        let obj = env.new_global_ref(obj)?;
        Ok(Self {
            inner: Arc::new(GlobalInner { env, obj }),
        })
    }

    /// The global reference
    #[inline]
    pub fn obj(&self) -> ObjRef {
        self.inner.obj
    }

    /// Whether both name the same managed object
    pub fn same_object(&self, other: &GlobalRef) -> bool {
        self.inner
            .env
            .is_same_object(Some(self.inner.obj), Some(other.inner.obj))
    }
}

impl fmt::Debug for GlobalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GlobalRef({:?})", self.inner.obj)
    }
}

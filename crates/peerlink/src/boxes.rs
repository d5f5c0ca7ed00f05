//! Boxes giving native values a reference identity
//!
//! [`ValueBox`] turns a plain value into a shared, mutable object that can
//! be handed across as a peer. [`HashableBox`] erases a `Hash + Eq` value so
//! the managed side can use it as a map key, with `hashCode` and `equals`
//! answered natively.

use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bridge::Bridge;
use crate::classes;
use crate::error::BridgeResult;
use crate::handle::NativeObject;
use crate::refs::LocalRef;
use crate::value::ManagedValue;

// ============================================================================
// ValueBox
// ============================================================================

/// Shared mutable cell for a value type
#[derive(Default)]
pub struct ValueBox<T> {
    value: RwLock<T>,
}

impl<T> ValueBox<T> {
    /// Box `value`
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Replace the value
    pub fn set(&self, value: T) {
        *self.value.write() = value;
    }

    /// Read through a closure
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read())
    }

    /// Mutate through a closure
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.value.write())
    }

    /// Unbox
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Clone> ValueBox<T> {
    /// Copy of the value
    pub fn get(&self) -> T {
        self.value.read().clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for ValueBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValueBox").field(&*self.value.read()).finish()
    }
}

// ============================================================================
// HashableBox
// ============================================================================

trait DynHash: Send + Sync {
    fn dyn_hash(&self) -> u64;
    fn dyn_eq(&self, other: &dyn DynHash) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Hash + Eq + Send + Sync + 'static> DynHash for T {
    fn dyn_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    fn dyn_eq(&self, other: &dyn DynHash) -> bool {
        other.as_any().downcast_ref::<T>().map_or(false, |other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Type-erased `Hash + Eq` value
pub struct HashableBox {
    value: Box<dyn DynHash>,
}

impl HashableBox {
    /// Erase `value`
    pub fn new<T: Hash + Eq + Send + Sync + 'static>(value: T) -> Self {
        Self { value: Box::new(value) }
    }

    /// The value, if it is a `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.as_any().downcast_ref::<T>()
    }

    /// 64-bit hash of the value
    pub fn hash_value(&self) -> u64 {
        self.value.dyn_hash()
    }

    /// Hash folded to the managed `hashCode` width
    pub fn hash_code(&self) -> i32 {
        let h = self.hash_value();
        (h ^ (h >> 32)) as i32
    }
}

impl PartialEq for HashableBox {
    fn eq(&self, other: &Self) -> bool {
        self.value.dyn_eq(&*other.value)
    }
}

impl Eq for HashableBox {}

impl Hash for HashableBox {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_value());
    }
}

impl fmt::Debug for HashableBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashableBox").field("hash", &self.hash_value()).finish()
    }
}

impl Bridge {
    /// Managed `NativeHashable` holding `value`
    pub fn wrap_hashable<T: Hash + Eq + Send + Sync + 'static>(&self, value: T) -> BridgeResult<LocalRef<'_>> {
        let boxed: NativeObject = Arc::new(HashableBox::new(value));
        let handle = self.handles().handle_for(Some(&boxed), true);
        self.new_object_raw(classes::NATIVE_HASHABLE, classes::PEER_CTOR, &[ManagedValue::long(handle.as_long())])
            .map_err(|e| {
                self.handles().release_abandoned(handle);
                e
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_box() {
        let b = ValueBox::new((1, 2));
        assert_eq!(b.get(), (1, 2));
        b.with_mut(|v| v.0 = 10);
        assert_eq!(b.with(|v| v.0 + v.1), 12);
        b.set((0, 0));
        assert_eq!(b.into_inner(), (0, 0));
    }

    #[test]
    fn test_hashable_equality() {
        let a = HashableBox::new("k".to_string());
        let b = HashableBox::new("k".to_string());
        let c = HashableBox::new("other".to_string());
        let d = HashableBox::new(7u32);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.hash_code(), b.hash_code());
        assert_eq!(a.downcast_ref::<String>().map(String::as_str), Some("k"));
        assert!(d.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_hash_code_fold() {
        let a = HashableBox::new(42u64);
        let h = a.hash_value();
        assert_eq!(a.hash_code(), (h ^ (h >> 32)) as i32);
    }
}

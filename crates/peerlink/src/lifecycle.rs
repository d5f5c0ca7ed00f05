//! Peer wrappers and their lifecycle
//!
//! A native object reaches the managed side as an instance of a peer class
//! constructed with a retained handle. The managed wrapper's finalizer
//! calls the native `release(J)V` bound here, which drops the handle
//! table's strong reference. Support classes of the bridge itself
//! (closures, hashable boxes, completions) are bound when the bridge is
//! created.

use std::any::Any;
use std::sync::Arc;

use crate::any::AnyValue;
use crate::bridge::Bridge;
use crate::classes;
use crate::closure::NativeClosure;
use crate::completion::CompletionEntry;
use crate::context::{NativeCall, NativeMethod};
use crate::convert::{Bridgeable, Parameter};
use crate::dispatch::{Failure, NativeArgs};
use crate::error::{BridgeError, BridgeResult};
use crate::handle::{NativeObject, PeerHandle};
use crate::boxes::HashableBox;
use crate::options::MarshalOptions;
use crate::polymorph::ClassChain;
use crate::refs::LocalRef;
use crate::value::{ClassRef, ManagedValue, ObjRef};

fn handle_arg(bridge: &Bridge, call: &NativeCall<'_>, index: usize) -> BridgeResult<PeerHandle> {
    let args = NativeArgs::new(bridge, call, MarshalOptions::empty());
    Ok(PeerHandle::from_long(args.get::<i64>(index)?))
}

fn release_method(bridge: &Bridge, class: &str) -> NativeMethod {
    bridge.native_method(format!("{}.release", class), |bridge, call| {
        let handle = handle_arg(bridge, call, 0)?;
        bridge.handles().release(handle)?;
        tracing::debug!(%handle, "peer released by finalizer");
        Ok(ManagedValue::void())
    })
}

fn projection_method(bridge: &Bridge, class: &str) -> NativeMethod {
    bridge.native_method(format!("{}.projection", class), |bridge, call| {
        let this = call
            .this
            .ok_or_else(|| BridgeError::InvalidValue("projection without receiver".to_string()))?;
        let peer = bridge.peer_of(this)?;
        let closure = bridge.closure_object(Arc::new(NativeClosure::new(move || Ok(AnyValue::Peer(peer.clone())))))?;
        Ok(Parameter::object(Some(closure)).into_return())
    })
}

fn bind(bridge: &Bridge, class: ClassRef, name: &str, sig: &str, method: NativeMethod) -> BridgeResult<()> {
    bridge.env().register_native(class, name, sig, method)
}

/// Bind the natives of the bridge support classes present in the runtime
pub(crate) fn register_support(bridge: &Arc<Bridge>) -> BridgeResult<()> {
    let env = bridge.env();
    let (release, release_sig) = classes::RELEASE;

    if let Some(class) = env.find_class(classes::NATIVE_CLOSURE) {
        let invoke = bridge.native_method("NativeClosure0.invokeNative", |bridge, call| {
            let closure = bridge.handles().resolve_as::<NativeClosure>(handle_arg(bridge, call, 0)?)?;
            let value = closure.call()?;
            Ok(Bridgeable::to_parameter(&value, bridge, bridge.default_options())?.into_return())
        });
        bind(bridge, class, "invokeNative", "(J)Lvm/lang/Object;", invoke)?;
        bind(bridge, class, release, release_sig, release_method(bridge, classes::NATIVE_CLOSURE))?;
    }

    if let Some(class) = env.find_class(classes::NATIVE_HASHABLE) {
        let hash_code = bridge.native_method("NativeHashable.hashCodeNative", |bridge, call| {
            let boxed = bridge.handles().resolve_as::<HashableBox>(handle_arg(bridge, call, 0)?)?;
            Ok(ManagedValue::int(boxed.hash_code()))
        });
        let equals = bridge.native_method("NativeHashable.equalsNative", |bridge, call| {
            let a = bridge.handles().resolve_as::<HashableBox>(handle_arg(bridge, call, 0)?)?;
            let b = bridge.handles().resolve_as::<HashableBox>(handle_arg(bridge, call, 1)?)?;
            Ok(ManagedValue::bool(a == b))
        });
        let (projection, projection_sig) = classes::PROJECTION_HOOK;
        bind(bridge, class, "hashCodeNative", "(J)I", hash_code)?;
        bind(bridge, class, "equalsNative", "(JJ)Z", equals)?;
        bind(bridge, class, release, release_sig, release_method(bridge, classes::NATIVE_HASHABLE))?;
        bind(bridge, class, projection, projection_sig, projection_method(bridge, classes::NATIVE_HASHABLE))?;
    }

    if let Some(class) = env.find_class(classes::COMPLETION) {
        let resume = bridge.native_method("Completion.resumeNative", |bridge, call| {
            let entry = bridge.handles().resolve_as::<CompletionEntry>(handle_arg(bridge, call, 0)?)?;
            let args = NativeArgs::new(bridge, call, MarshalOptions::empty());
            let value = args.value(1)?.as_object().flatten();
            let throwable = args.value(2)?.as_object().flatten();
            entry.resume(bridge, value, throwable).map_err(Failure::Bridge)?;
            Ok(ManagedValue::void())
        });
        bind(
            bridge,
            class,
            "resumeNative",
            "(JLvm/lang/Object;Lvm/lang/Throwable;)V",
            resume,
        )?;
        bind(bridge, class, release, release_sig, release_method(bridge, classes::COMPLETION))?;
    }

    Ok(())
}

// ============================================================================
// Peer classes
// ============================================================================

impl Bridge {
    /// Register the managed classes wrapping the chain's native types and
    /// bind their `release` (and, where declared, `projection`) natives
    pub fn register_peer_class(&self, chain: ClassChain) -> BridgeResult<Arc<ClassChain>> {
        let chain = Arc::new(chain);
        let (release, release_sig) = classes::RELEASE;
        let (projection, projection_sig) = classes::PROJECTION_HOOK;
        for class in chain.classes() {
            let signature = self.describe(class)?;
            bind(self, signature.class(), release, release_sig, release_method(self, class))?;
            if self.env().method_id(signature.class(), projection, projection_sig).is_some() {
                bind(self, signature.class(), projection, projection_sig, projection_method(self, class))?;
            }
        }
        for member in chain.members() {
            self.peer_classes.insert(*member, chain.clone());
        }
        tracing::debug!(base = chain.base_class(), members = chain.members().len(), "peer class registered");
        Ok(chain)
    }

    /// Construct the managed wrapper of a native object, handing it a
    /// retained handle
    pub fn wrap_peer(&self, obj: &NativeObject) -> BridgeResult<LocalRef<'_>> {
        let type_id = (**obj).type_id();
        let chain = self
            .peer_classes
            .get(&type_id)
            .map(|chain| chain.clone())
            .ok_or_else(|| BridgeError::InvalidValue(format!("no peer class registered for {:?}", type_id)))?;
        let pair = chain.constructor_for(self, &**obj)?;

        let handle = self.handles().handle_for(Some(obj), true);
        let created = self
            .env()
            .new_object(pair.class, pair.ctor, &[ManagedValue::long(handle.as_long())]);
        match created {
            Ok(Some(wrapper)) => Ok(self.local(wrapper)),
            Ok(None) => {
                self.handles().release_abandoned(handle);
                self.check_exception()?;
                Err(BridgeError::Runtime(format!("constructor of `{}` produced no object", chain.select(&**obj))))
            }
            Err(e) => {
                self.handles().release_abandoned(handle);
                Err(e)
            }
        }
    }

    fn peer_handle(&self, obj: ObjRef) -> BridgeResult<PeerHandle> {
        let (name, sig) = classes::PEER_OF;
        let value = self.call_static_raw(classes::BRIDGE_SUPPORT, name, sig, &[ManagedValue::object(Some(obj))])?;
        let raw = value
            .as_long()
            .ok_or_else(|| BridgeError::mismatch("long", value.type_name()))?;
        Ok(PeerHandle::from_long(raw))
    }

    /// Native peer of a peer-bridged managed object, `None` for any other object
    pub fn try_peer_of(&self, obj: ObjRef) -> BridgeResult<Option<NativeObject>> {
        let handle = self.peer_handle(obj)?;
        if handle.is_none() {
            return Ok(None);
        }
        self.handles().resolve(handle).map(Some)
    }

    /// Native peer of a peer-bridged managed object
    pub fn peer_of(&self, obj: ObjRef) -> BridgeResult<NativeObject> {
        self.try_peer_of(obj)?.ok_or(BridgeError::NullHandle)
    }

    /// Native peer of a peer-bridged managed object, as `T`
    pub fn peer_as<T: Any + Send + Sync>(&self, obj: ObjRef) -> BridgeResult<Arc<T>> {
        self.handles().resolve_as::<T>(self.peer_handle(obj)?)
    }
}

impl<T: Any + Send + Sync> Bridgeable for Arc<T> {
    const POLYMORPHIC: bool = true;

    fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, _options: MarshalOptions) -> BridgeResult<Self> {
        bridge.peer_as::<T>(obj.ok_or(BridgeError::NullHandle)?)
    }

    fn to_managed<'b>(&self, bridge: &'b Bridge, _options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
        let obj: NativeObject = self.clone();
        bridge.wrap_peer(&obj).map(Some)
    }

    fn from_any(value: AnyValue, _bridge: &Bridge, _options: MarshalOptions) -> BridgeResult<Self> {
        match value {
            AnyValue::Peer(obj) => obj.downcast::<T>().map_err(|_| BridgeError::HandleTypeMismatch {
                handle: 0,
                expected: std::any::type_name::<T>(),
            }),
            AnyValue::Null => Err(BridgeError::NullHandle),
            other => Err(BridgeError::mismatch(std::any::type_name::<T>(), format!("{:?}", other))),
        }
    }
}

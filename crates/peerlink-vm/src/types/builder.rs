//! Fluent class definitions

use std::sync::Arc;

use parking_lot::RwLock;
use peerlink::classes::{OBJECT, PEER_BRIDGED, PEER_CTOR, RELEASE};

use super::class::{FieldDef, MethodBody};
use super::{CONSTRUCTOR, FINALIZE};
use crate::value::Value;
use crate::vm::{Invocation, Raise, Vm};

pub(crate) struct MethodDef {
    pub(crate) name: String,
    pub(crate) sig: String,
    pub(crate) is_static: bool,
    pub(crate) body: MethodBody,
}

/// Definition of a class, consumed by [`Vm::define_class`]
pub struct ClassDef {
    pub(crate) name: String,
    pub(crate) parent: Option<String>,
    pub(crate) interfaces: Vec<String>,
    pub(crate) is_interface: bool,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) statics: Vec<(FieldDef, Value)>,
    pub(crate) methods: Vec<MethodDef>,
}

impl ClassDef {
    /// Class extending `vm/lang/Object`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            interfaces: Vec::new(),
            is_interface: false,
            fields: Vec::new(),
            statics: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Interface
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            is_interface: true,
            ..Self::new(name)
        }
    }

    /// Class wrapping a native peer.
    ///
    /// Declares the `peer` field (unless inherited from `parent`), a `(J)V`
    /// constructor storing the handle, the native `release(J)V` and a
    /// finalizer calling it. Subclasses pass the peer class they extend.
    pub fn peer(name: impl Into<String>, parent: Option<&str>) -> Self {
        let def = Self::new(name).constructor(PEER_CTOR, |vm, inv| {
            vm.put_field(inv.this()?, "peer", Value::Long(inv.long(0)?))?;
            Ok(Value::Void)
        });
        match parent {
            Some(parent) => def.extends(parent),
            None => {
                let (release, release_sig) = RELEASE;
                def.implements(PEER_BRIDGED)
                    .field("peer", "J")
                    .native_method(release, release_sig)
                    .method(FINALIZE.0, FINALIZE.1, |vm, inv| {
                        let this = inv.this()?;
                        let peer = vm.field(this, "peer")?;
                        if peer != Value::Long(0) {
                            vm.put_field(this, "peer", Value::Long(0))?;
                            vm.call_virtual(this, RELEASE.0, RELEASE.1, &[peer])?;
                        }
                        Ok(Value::Void)
                    })
            }
        }
    }

    /// Set the superclass
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Implement (or, for interfaces, extend) an interface
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Declare an instance field
    pub fn field(mut self, name: impl Into<String>, sig: impl Into<String>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            sig: sig.into(),
        });
        self
    }

    /// Declare a static field with its initial value
    pub fn static_field(mut self, name: impl Into<String>, sig: impl Into<String>, initial: Value) -> Self {
        self.statics.push((
            FieldDef {
                name: name.into(),
                sig: sig.into(),
            },
            initial,
        ));
        self
    }

    fn push(mut self, name: &str, sig: &str, is_static: bool, body: MethodBody) -> Self {
        self.methods.push(MethodDef {
            name: name.to_string(),
            sig: sig.to_string(),
            is_static,
            body,
        });
        self
    }

    /// Declare a constructor
    pub fn constructor<F>(self, sig: &str, body: F) -> Self
    where
        F: Fn(&Vm, &Invocation<'_>) -> Result<Value, Raise> + Send + Sync + 'static,
    {
        self.push(CONSTRUCTOR, sig, false, MethodBody::Managed(Arc::new(body)))
    }

    /// Declare an instance method
    pub fn method<F>(self, name: &str, sig: &str, body: F) -> Self
    where
        F: Fn(&Vm, &Invocation<'_>) -> Result<Value, Raise> + Send + Sync + 'static,
    {
        self.push(name, sig, false, MethodBody::Managed(Arc::new(body)))
    }

    /// Declare a static method
    pub fn static_method<F>(self, name: &str, sig: &str, body: F) -> Self
    where
        F: Fn(&Vm, &Invocation<'_>) -> Result<Value, Raise> + Send + Sync + 'static,
    {
        self.push(name, sig, true, MethodBody::Managed(Arc::new(body)))
    }

    /// Declare a native instance method
    pub fn native_method(self, name: &str, sig: &str) -> Self {
        self.push(name, sig, false, MethodBody::Native(RwLock::new(None)))
    }

    /// Declare a native static method
    pub fn static_native(self, name: &str, sig: &str) -> Self {
        self.push(name, sig, true, MethodBody::Native(RwLock::new(None)))
    }

    /// Declare an instance method without implementation
    pub fn abstract_method(self, name: &str, sig: &str) -> Self {
        self.push(name, sig, false, MethodBody::Abstract)
    }

    /// Class path
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn parent_name(&self) -> Option<&str> {
        match &self.parent {
            Some(parent) => Some(parent),
            None if self.is_interface || self.name == OBJECT => None,
            None => Some(OBJECT),
        }
    }
}

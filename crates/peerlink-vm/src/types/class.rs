//! Classes, fields and methods

use std::fmt;

use parking_lot::RwLock;
use peerlink::NativeMethod;

use crate::value::Value;
use crate::vm::ManagedFn;

/// Index of a class in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

impl From<peerlink::ClassRef> for ClassId {
    fn from(class: peerlink::ClassRef) -> Self {
        ClassId(class.0)
    }
}

impl From<ClassId> for peerlink::ClassRef {
    fn from(id: ClassId) -> Self {
        peerlink::ClassRef(id.0)
    }
}

/// Field declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Type signature
    pub sig: String,
}

/// Method implementation
pub enum MethodBody {
    /// Implemented by the VM or its embedder
    Managed(ManagedFn),
    /// Declared native, bound through `register_native`
    Native(RwLock<Option<NativeMethod>>),
    /// No implementation (interfaces)
    Abstract,
}

/// Method declaration
pub struct Method {
    /// Method name, `<init>` for constructors
    pub name: String,
    /// Method signature
    pub sig: String,
    /// Static method
    pub is_static: bool,
    /// Implementation
    pub body: MethodBody,
}

impl Method {
    /// Check if this method is declared native
    pub fn is_native(&self) -> bool {
        matches!(self.body, MethodBody::Native(_))
    }

    /// Check if this method has no implementation
    pub fn is_abstract(&self) -> bool {
        matches!(self.body, MethodBody::Abstract)
    }

    /// Bind a native implementation. Returns false if the method is not native.
    pub fn bind(&self, native: NativeMethod) -> bool {
        match &self.body {
            MethodBody::Native(slot) => {
                *slot.write() = Some(native);
                true
            }
            _ => false,
        }
    }

    /// Bound native implementation
    pub fn native(&self) -> Option<NativeMethod> {
        match &self.body {
            MethodBody::Native(slot) => slot.read().clone(),
            _ => None,
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.body {
            MethodBody::Managed(_) => "managed",
            MethodBody::Native(_) => "native",
            MethodBody::Abstract => "abstract",
        };
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("sig", &self.sig)
            .field("is_static", &self.is_static)
            .field("kind", &kind)
            .finish()
    }
}

/// Class definition
#[derive(Debug)]
pub struct Class {
    /// Class id
    pub id: ClassId,
    /// Slash-separated class path
    pub name: String,
    /// Superclass (None for the root class and interfaces)
    pub parent: Option<ClassId>,
    /// Directly implemented (or, for interfaces, extended) interfaces
    pub interfaces: Vec<ClassId>,
    /// Interface flag
    pub is_interface: bool,
    /// Instance fields, inherited first
    pub fields: Vec<FieldDef>,
    /// Static fields declared by this class
    pub static_fields: Vec<FieldDef>,
    /// Methods declared by this class
    pub methods: Vec<Method>,
    /// Overrides `finalize()V` somewhere below the root class
    pub has_finalizer: bool,
    statics: RwLock<Vec<Value>>,
}

impl Class {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: ClassId,
        name: String,
        parent: Option<ClassId>,
        interfaces: Vec<ClassId>,
        is_interface: bool,
        fields: Vec<FieldDef>,
        statics: Vec<(FieldDef, Value)>,
        methods: Vec<Method>,
        has_finalizer: bool,
    ) -> Self {
        let (static_fields, initial): (Vec<_>, Vec<_>) = statics.into_iter().unzip();
        Self {
            id,
            name,
            parent,
            interfaces,
            is_interface,
            fields,
            static_fields,
            methods,
            has_finalizer,
            statics: RwLock::new(initial),
        }
    }

    /// Slot of an instance field. Shadowing fields resolve to the most derived.
    pub fn field_slot(&self, name: &str) -> Option<usize> {
        self.fields.iter().rposition(|f| f.name == name)
    }

    /// Index of a method declared by this class
    pub fn declared_method(&self, name: &str, sig: &str, is_static: bool) -> Option<usize> {
        self.methods
            .iter()
            .position(|m| m.name == name && m.sig == sig && m.is_static == is_static)
    }

    /// Read a static field
    pub fn static_value(&self, index: usize) -> Option<Value> {
        self.statics.read().get(index).copied()
    }

    /// Write a static field
    pub fn set_static(&self, index: usize, value: Value) -> bool {
        match self.statics.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Current values of all static fields
    pub fn statics_snapshot(&self) -> Vec<Value> {
        self.statics.read().clone()
    }

    /// Zero values for a new instance
    pub fn initial_fields(&self) -> Vec<Value> {
        self.fields.iter().map(|f| Value::default_for(&f.sig)).collect()
    }
}

//! Peerlink reference managed runtime
//!
//! A small object VM that implements [`peerlink::ManagedEnv`], so the
//! bridge can be exercised end to end without an external runtime:
//! - Class model with single inheritance, interfaces and virtual dispatch
//! - Heap of managed objects with a precise mark-sweep collector
//! - Finalizers, local/global references and per-thread pending exceptions
//! - The class library the bridge expects (`vm/lang`, `vm/util`,
//!   `bridge/lib`, `bridge/foundation`, `bridge/kt`)
//!
//! Method bodies are Rust closures over [`Vm`]; methods declared native
//! are bound at runtime through `register_native`.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod builtin;
pub mod gc;
pub mod object;
pub mod types;
pub mod value;
pub mod vm;

pub use gc::GcStats;
pub use object::{HeapId, HeapObject, MapEntry, Payload};
pub use types::{Class, ClassDef, ClassId, ClassRegistry, FieldDef, Method, MethodBody};
pub use value::Value;
pub use vm::{Entered, Invocation, ManagedFn, Raise, Vm, VmOptions};

/// VM execution errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VmError {
    /// Class lookup failed
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// A class with this name is already defined
    #[error("Class already defined: {0}")]
    DuplicateClass(String),

    /// Method lookup failed
    #[error("Method not found: {class}.{name}{sig}")]
    MethodNotFound {
        /// Class searched
        class: String,
        /// Method name
        name: String,
        /// Method signature
        sig: String,
    },

    /// Field lookup failed
    #[error("Field not found: {class}.{name}")]
    FieldNotFound {
        /// Class searched
        class: String,
        /// Field name
        name: String,
    },

    /// Native method called before being bound
    #[error("Unbound native method: {0}")]
    UnboundNative(String),

    /// Abstract method invoked
    #[error("Abstract method invoked: {0}")]
    AbstractMethod(String),

    /// Local or global reference not known to the VM
    #[error("Invalid reference: {0:#x}")]
    InvalidReference(u64),

    /// Heap slot does not hold a live object
    #[error("Stale object: #{0}")]
    StaleObject(u32),

    /// Call depth exceeded `VmOptions::max_call_depth`
    #[error("Stack overflow")]
    StackOverflow,

    /// Null pointer exception
    #[error("Null pointer exception")]
    NullPointer,

    /// Type error
    #[error("Type error: {0}")]
    TypeError(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

/// VM execution result
pub type VmResult<T> = Result<T, VmError>;

impl From<VmError> for peerlink::BridgeError {
    fn from(e: VmError) -> Self {
        match e {
            VmError::InvalidReference(raw) => {
                peerlink::BridgeError::InvalidReference(format!("{:#x}", raw))
            }
            other => peerlink::BridgeError::Runtime(other.to_string()),
        }
    }
}

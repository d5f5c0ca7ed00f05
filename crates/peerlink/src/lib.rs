//! Peerlink cross-runtime object bridge
//!
//! This crate lets native Rust objects and the objects of a managed VM
//! reference, call and convert each other:
//! - Peer handle table (opaque handles, retain/release from finalizers)
//! - Type signature registry (memoized class and member identifiers)
//! - Static and runtime-category value conversion
//! - Polymorphic peer wrappers
//! - Call dispatch in both directions, including asynchronous completions
//!
//! The managed runtime is reached only through [`ManagedEnv`];
//! `peerlink-vm` provides a reference implementation.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod any;
pub mod boxes;
pub mod bridge;
pub mod category;
pub mod classes;
pub mod closure;
pub mod completion;
pub mod config;
pub mod context;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod handle;
mod lifecycle;
pub mod marshal;
pub mod options;
pub mod polymorph;
pub mod refs;
pub mod registry;
pub mod value;

pub use any::{keep_managed, AnyValue, Codec, CodecTable};
pub use boxes::{HashableBox, ValueBox};
pub use bridge::Bridge;
pub use category::TypeCategory;
pub use closure::NativeClosure;
pub use completion::{Completion, CompletionEntry, Resolver};
pub use config::BridgeConfig;
pub use context::{ManagedEnv, NativeCall, NativeMethod};
pub use convert::{element_from_managed, Argument, Bridgeable, Parameter};
pub use dispatch::{Failure, NativeArgs};
pub use error::{BridgeError, BridgeResult, ErrorKind, ThrownError};
pub use handle::{HandleStats, HandleTable, NativeObject, PeerHandle};
pub use marshal::{Data, Timestamp};
pub use options::MarshalOptions;
pub use polymorph::{ClassChain, ClassChainBuilder, ConstructorPair};
pub use refs::{GlobalRef, LocalRef};
pub use registry::{ClassSignature, SignatureRegistry};
pub use value::{ClassRef, FieldId, ManagedValue, MethodId, ObjRef};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

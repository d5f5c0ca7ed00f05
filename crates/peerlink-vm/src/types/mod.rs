//! Class model
//!
//! Classes are defined once through a [`ClassDef`] and never change
//! afterwards, except for the implementations of native methods which are
//! bound at runtime. A class id is its index in the [`ClassRegistry`].

mod builder;
mod class;
mod registry;

pub use builder::ClassDef;
pub use class::{Class, ClassId, FieldDef, Method, MethodBody};
pub use registry::ClassRegistry;

/// Name of the constructor pseudo-method
pub const CONSTRUCTOR: &str = "<init>";

/// Finalizer hook
pub const FINALIZE: (&str, &str) = ("finalize", "()V");

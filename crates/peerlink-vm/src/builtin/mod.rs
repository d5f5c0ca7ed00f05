//! Builtin class library
//!
//! The classes the bridge relies on (see [`peerlink::classes`]) plus the
//! exception hierarchy and collection internals they need.

mod lang;
mod library;
mod support;
mod util;

use peerlink::classes as names;

use crate::object::HeapId;
use crate::value::Value;
use crate::vm::{Raise, Vm};
use crate::VmResult;

/// Base of unchecked exceptions
pub const RUNTIME_EXCEPTION: &str = "vm/lang/RuntimeException";
/// Base of checked exceptions
pub const EXCEPTION: &str = "vm/lang/Exception";
/// Base of unrecoverable errors
pub const ERROR: &str = "vm/lang/Error";
/// Null dereference
pub const NULL_POINTER_EXCEPTION: &str = "vm/lang/NullPointerException";
/// Rejected argument
pub const ILLEGAL_ARGUMENT_EXCEPTION: &str = "vm/lang/IllegalArgumentException";
/// Operation invalid in the current state
pub const ILLEGAL_STATE_EXCEPTION: &str = "vm/lang/IllegalStateException";
/// Index outside a collection
pub const INDEX_OUT_OF_BOUNDS_EXCEPTION: &str = "vm/lang/IndexOutOfBoundsException";
/// Iterator exhausted
pub const NO_SUCH_ELEMENT_EXCEPTION: &str = "vm/util/NoSuchElementException";
/// Snapshot iterator over list, set and key-set contents
pub const ARRAY_ITERATOR: &str = "vm/util/ArrayIterator";

pub(crate) fn install(vm: &Vm) -> VmResult<()> {
    lang::install(vm)?;
    util::install(vm)?;
    library::install(vm)?;
    support::install(vm)
}

/// Box a scalar into its `vm/lang` wrapper class. References pass through.
pub fn box_value(vm: &Vm, value: Value) -> Result<Value, Raise> {
    let (class, ctor, _, _) = match value {
        Value::Bool(_) => names::BOOLEAN,
        Value::Byte(_) => names::BYTE,
        Value::Char(_) => names::CHARACTER,
        Value::Short(_) => names::SHORT,
        Value::Int(_) => names::INTEGER,
        Value::Long(_) => names::LONG,
        Value::Float(_) => names::FLOAT,
        Value::Double(_) => names::DOUBLE,
        Value::Ref(_) | Value::Void => return Ok(value),
    };
    Ok(Value::object(vm.construct(class, ctor, &[value])?))
}

/// Scalar held by a `vm/lang` wrapper object
pub fn unbox(vm: &Vm, id: HeapId) -> VmResult<Value> {
    vm.field(id, "value")
}

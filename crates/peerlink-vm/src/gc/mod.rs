//! Garbage collection
//!
//! Precise, stop-the-world mark-sweep over the object heap.
//!
//! # Roots
//!
//! - Local references (top-level ones and those of running native frames)
//! - Global references
//! - Static fields of every class
//! - Pending exceptions of every thread
//! - Objects queued for finalization
//!
//! # Stopping the world
//!
//! Every entry into the VM holds the world lock shared; a collection takes
//! it exclusively, so it only runs while no thread executes managed code.
//! Managed method bodies can therefore hold raw [`HeapId`]s for the
//! duration of a call without rooting them.
//!
//! # Finalization
//!
//! An unreachable object whose class overrides `finalize()V` is not freed
//! by the cycle that discovers it: it is flagged, queued (which keeps it
//! and everything it references alive) and its finalizer runs once the
//! world lock is released. A later cycle frees it if it is still
//! unreachable. Finalizers run at most once per object.
//!
//! [`HeapId`]: crate::object::HeapId

mod collector;
mod heap;
mod refs;

pub use collector::GcStats;
pub(crate) use collector::mark_sweep;
pub use heap::Heap;
pub use refs::RefTables;

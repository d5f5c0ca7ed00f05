//! Local and global reference tables
//!
//! References handed across the [`ManagedEnv`](peerlink::ManagedEnv)
//! boundary are slot ids into these tables, never heap ids, so the
//! collector sees every object the native side can still reach. Locals
//! created while a native method runs are recorded in that thread's
//! frame and deleted when the method returns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use peerlink::ObjRef;

use crate::object::HeapId;
use crate::{VmError, VmResult};

/// Reference tables of one VM
#[derive(Debug)]
pub struct RefTables {
    locals: DashMap<u64, HeapId>,
    globals: DashMap<u64, HeapId>,
    next_local: AtomicU64,
    next_global: AtomicU64,
    frames: DashMap<ThreadId, Vec<Vec<u64>>>,
}

impl Default for RefTables {
    fn default() -> Self {
        Self::new()
    }
}

impl RefTables {
    /// Create empty tables
    pub fn new() -> Self {
        Self {
            locals: DashMap::new(),
            globals: DashMap::new(),
            next_local: AtomicU64::new(1),
            next_global: AtomicU64::new(1),
            frames: DashMap::new(),
        }
    }

    /// New local reference to `id`, owned by the current native frame if any
    pub fn new_local(&self, id: HeapId) -> VmResult<ObjRef> {
        let slot = self.next_local.fetch_add(1, Ordering::Relaxed);
        let obj = ObjRef::local(slot).ok_or_else(|| VmError::RuntimeError("local reference ids exhausted".into()))?;
        self.locals.insert(slot, id);
        if let Some(mut frames) = self.frames.get_mut(&thread::current().id()) {
            if let Some(frame) = frames.last_mut() {
                frame.push(slot);
            }
        }
        Ok(obj)
    }

    /// New global reference to `id`
    pub fn new_global(&self, id: HeapId) -> VmResult<ObjRef> {
        let slot = self.next_global.fetch_add(1, Ordering::Relaxed);
        let obj = ObjRef::global(slot).ok_or_else(|| VmError::RuntimeError("global reference ids exhausted".into()))?;
        self.globals.insert(obj.id(), id);
        Ok(obj)
    }

    /// Referent of a local or global reference
    pub fn resolve(&self, obj: ObjRef) -> VmResult<HeapId> {
        let table = if obj.is_global() { &self.globals } else { &self.locals };
        table
            .get(&obj.id())
            .map(|id| *id)
            .ok_or(VmError::InvalidReference(obj.as_raw()))
    }

    /// Delete a reference. Returns false if it was unknown.
    pub fn delete(&self, obj: ObjRef) -> bool {
        let table = if obj.is_global() { &self.globals } else { &self.locals };
        table.remove(&obj.id()).is_some()
    }

    /// Open a native frame on the current thread
    pub fn push_frame(&self) {
        self.frames.entry(thread::current().id()).or_default().push(Vec::new());
    }

    /// Close the current thread's innermost frame, deleting its locals.
    /// Returns the number of locals deleted.
    pub fn pop_frame(&self) -> usize {
        let tid = thread::current().id();
        let frame = {
            let Some(mut frames) = self.frames.get_mut(&tid) else { return 0 };
            frames.pop()
        };
        self.frames.remove_if(&tid, |_, frames| frames.is_empty());
        frame.map_or(0, |slots| slots.into_iter().filter(|slot| self.locals.remove(slot).is_some()).count())
    }

    /// Number of live local references
    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    /// Number of live global references
    pub fn global_count(&self) -> usize {
        self.globals.len()
    }

    /// Referents of every live reference
    pub fn roots(&self) -> Vec<HeapId> {
        self.locals
            .iter()
            .map(|e| *e.value())
            .chain(self.globals.iter().map(|e| *e.value()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_and_global_resolution() {
        let refs = RefTables::new();
        let local = refs.new_local(HeapId(4)).unwrap();
        let global = refs.new_global(HeapId(4)).unwrap();
        assert!(!local.is_global());
        assert!(global.is_global());
        assert_eq!(refs.resolve(local).unwrap(), HeapId(4));
        assert_eq!(refs.resolve(global).unwrap(), HeapId(4));

        assert!(refs.delete(local));
        assert!(!refs.delete(local));
        assert!(matches!(refs.resolve(local), Err(VmError::InvalidReference(_))));
        assert_eq!(refs.global_count(), 1);
    }

    #[test]
    fn test_frame_deletes_its_locals() {
        let refs = RefTables::new();
        let outer = refs.new_local(HeapId(1)).unwrap();
        refs.push_frame();
        let inner = refs.new_local(HeapId(2)).unwrap();
        let deleted_early = refs.new_local(HeapId(3)).unwrap();
        refs.delete(deleted_early);
        assert_eq!(refs.pop_frame(), 1);
        assert!(refs.resolve(inner).is_err());
        assert!(refs.resolve(outer).is_ok());
        assert_eq!(refs.local_count(), 1);
    }

    #[test]
    fn test_roots() {
        let refs = RefTables::new();
        refs.new_local(HeapId(1)).unwrap();
        refs.new_global(HeapId(2)).unwrap();
        let mut roots = refs.roots();
        roots.sort();
        assert_eq!(roots, vec![HeapId(1), HeapId(2)]);
    }
}

//! Object heap
//!
//! A slot vector with a free list. Freed slots are reused by later
//! allocations, so a [`HeapId`] is only meaningful while its object is
//! reachable.

use crate::object::{HeapId, HeapObject};
use crate::{VmError, VmResult};

/// Slot allocator for managed objects
#[derive(Debug, Default)]
pub struct Heap {
    slots: Vec<Option<HeapObject>>,
    free: Vec<u32>,
    live: usize,
    allocated_total: u64,
}

impl Heap {
    /// Create an empty heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object
    pub fn alloc(&mut self, object: HeapObject) -> HeapId {
        self.live += 1;
        self.allocated_total += 1;
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(object);
                HeapId(slot)
            }
            None => {
                self.slots.push(Some(object));
                HeapId(self.slots.len() as u32 - 1)
            }
        }
    }

    /// Live object at `id`
    pub fn get(&self, id: HeapId) -> VmResult<&HeapObject> {
        self.slots
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(VmError::StaleObject(id.0))
    }

    /// Live object at `id`, mutably
    pub fn get_mut(&mut self, id: HeapId) -> VmResult<&mut HeapObject> {
        self.slots
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(VmError::StaleObject(id.0))
    }

    /// Free the object at `id`. Returns false if the slot was empty.
    pub fn free(&mut self, id: HeapId) -> bool {
        match self.slots.get_mut(id.0 as usize) {
            Some(slot @ Some(_)) => {
                *slot = None;
                self.free.push(id.0);
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    /// Number of live objects
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Number of objects allocated since creation
    pub fn allocated_total(&self) -> u64 {
        self.allocated_total
    }

    /// Ids of all live objects
    pub fn ids(&self) -> Vec<HeapId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| HeapId(i as u32))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Payload;
    use crate::types::ClassId;

    fn obj() -> HeapObject {
        HeapObject::new(ClassId(0), Vec::new(), Payload::None)
    }

    #[test]
    fn test_alloc_and_free() {
        let mut heap = Heap::new();
        let a = heap.alloc(obj());
        let b = heap.alloc(obj());
        assert_ne!(a, b);
        assert_eq!(heap.live_count(), 2);

        assert!(heap.free(a));
        assert!(!heap.free(a));
        assert!(matches!(heap.get(a), Err(VmError::StaleObject(_))));
        assert_eq!(heap.live_count(), 1);
        assert_eq!(heap.ids(), vec![b]);
    }

    #[test]
    fn test_slots_reused() {
        let mut heap = Heap::new();
        let a = heap.alloc(obj());
        heap.free(a);
        let c = heap.alloc(obj());
        assert_eq!(a, c);
        assert_eq!(heap.allocated_total(), 2);
    }
}

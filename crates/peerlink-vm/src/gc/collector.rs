//! Mark-sweep collector

use std::time::{Duration, Instant};

use super::heap::Heap;
use crate::object::HeapId;
use crate::types::ClassRegistry;

/// Garbage collector statistics
#[derive(Debug, Clone, Default)]
pub struct GcStats {
    /// Total number of collections
    pub collections: usize,

    /// Total objects freed
    pub objects_freed: usize,

    /// Total objects queued for finalization
    pub finalizers_queued: usize,

    /// Total pause time
    pub total_pause_time: Duration,

    /// Last collection duration
    pub last_pause_time: Duration,
}

fn mark(heap: &mut Heap, mut worklist: Vec<HeapId>) {
    while let Some(id) = worklist.pop() {
        let Ok(object) = heap.get_mut(id) else { continue };
        if object.marked {
            continue;
        }
        object.marked = true;
        object.trace(&mut worklist);
    }
}

/// Run one collection cycle.
///
/// `queue` holds the objects awaiting finalization; it is a root set, and
/// newly discovered finalizable objects are appended to it.
pub(crate) fn mark_sweep(
    heap: &mut Heap,
    classes: &ClassRegistry,
    roots: Vec<HeapId>,
    queue: &mut Vec<HeapId>,
    stats: &mut GcStats,
) {
    let start = Instant::now();
    let ids = heap.ids();

    // Clear mark bits
    for id in &ids {
        if let Ok(object) = heap.get_mut(*id) {
            object.marked = false;
        }
    }

    // Mark from roots
    let mut worklist = roots;
    worklist.extend(queue.iter().copied());
    mark(heap, worklist);

    // Resurrect unreachable finalizable objects into the queue
    let mut discovered = Vec::new();
    for id in &ids {
        if let Ok(object) = heap.get_mut(*id) {
            let finalizable = classes.get(object.class).map_or(false, |c| c.has_finalizer);
            if !object.marked && finalizable && !object.finalized {
                object.finalized = true;
                discovered.push(*id);
            }
        }
    }
    mark(heap, discovered.clone());
    stats.finalizers_queued += discovered.len();
    queue.extend(discovered);

    // Sweep
    let mut freed = 0;
    for id in ids {
        let dead = heap.get(id).map_or(false, |object| !object.marked);
        if dead && heap.free(id) {
            freed += 1;
        }
    }

    let duration = start.elapsed();
    stats.collections += 1;
    stats.objects_freed += freed;
    stats.last_pause_time = duration;
    stats.total_pause_time += duration;
    tracing::debug!(freed, live = heap.live_count(), ?duration, "gc cycle");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{HeapObject, Payload};
    use crate::types::{ClassDef, ClassId};
    use crate::value::Value;
    use peerlink::classes::OBJECT;

    fn classes() -> ClassRegistry {
        let mut reg = ClassRegistry::new();
        reg.define(ClassDef::new(OBJECT).method("finalize", "()V", |_, _| Ok(Value::Void)))
            .unwrap();
        reg.define(ClassDef::new("demo/Plain")).unwrap();
        reg.define(ClassDef::new("demo/Final").method("finalize", "()V", |_, _| Ok(Value::Void)))
            .unwrap();
        reg
    }

    fn node(class: u32, next: Option<HeapId>) -> HeapObject {
        HeapObject::new(ClassId(class), vec![Value::Ref(next)], Payload::None)
    }

    #[test]
    fn test_unreachable_freed() {
        let reg = classes();
        let mut heap = Heap::new();
        let tail = heap.alloc(node(1, None));
        let head = heap.alloc(node(1, Some(tail)));
        let garbage = heap.alloc(node(1, None));

        let mut queue = Vec::new();
        let mut stats = GcStats::default();
        mark_sweep(&mut heap, &reg, vec![head], &mut queue, &mut stats);

        assert!(heap.get(head).is_ok());
        assert!(heap.get(tail).is_ok());
        assert!(heap.get(garbage).is_err());
        assert_eq!(stats.objects_freed, 1);
        assert_eq!(stats.collections, 1);
    }

    #[test]
    fn test_cycles_collected() {
        let reg = classes();
        let mut heap = Heap::new();
        let a = heap.alloc(node(1, None));
        let b = heap.alloc(node(1, Some(a)));
        heap.get_mut(a).unwrap().fields[0] = Value::object(b);

        let mut stats = GcStats::default();
        mark_sweep(&mut heap, &reg, Vec::new(), &mut Vec::new(), &mut stats);
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn test_finalizable_queued_once_then_freed() {
        let reg = classes();
        let mut heap = Heap::new();
        let child = heap.alloc(node(1, None));
        let wrapper = heap.alloc(node(2, Some(child)));

        let mut queue = Vec::new();
        let mut stats = GcStats::default();
        mark_sweep(&mut heap, &reg, Vec::new(), &mut queue, &mut stats);
        assert_eq!(queue, vec![wrapper]);
        assert!(heap.get(wrapper).is_ok());
        assert!(heap.get(child).is_ok());
        assert_eq!(stats.finalizers_queued, 1);

        // Finalizer ran: dequeue, next cycle frees both
        queue.clear();
        mark_sweep(&mut heap, &reg, Vec::new(), &mut queue, &mut stats);
        assert!(queue.is_empty());
        assert_eq!(heap.live_count(), 0);
        assert_eq!(stats.finalizers_queued, 1);
    }
}

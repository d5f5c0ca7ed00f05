//! Virtual machine
//!
//! [`Vm`] owns the class registry, the heap, the reference tables and the
//! per-thread exception state. It is always shared behind an `Arc` and may
//! be entered from any number of threads at once.

mod env;
mod invoke;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use crate::builtin;
use crate::gc::{self, GcStats, Heap, RefTables};
use crate::object::HeapId;
use crate::types::{Class, ClassDef, ClassId, ClassRegistry, FINALIZE};
use crate::{VmError, VmResult};

pub use invoke::{Invocation, ManagedFn, Raise};

/// VM configuration
#[derive(Debug, Clone)]
pub struct VmOptions {
    /// Allocations between automatic collections (0 disables automatic GC)
    pub gc_threshold: usize,

    /// Maximum nesting of managed calls per thread
    pub max_call_depth: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            gc_threshold: 10_000,
            max_call_depth: 512,
        }
    }
}

/// Reference managed runtime
pub struct Vm {
    options: VmOptions,
    classes: RwLock<ClassRegistry>,
    heap: Mutex<Heap>,
    refs: RefTables,
    world: RwLock<()>,
    entered: DashMap<ThreadId, usize>,
    pending: DashMap<ThreadId, HeapId>,
    finalize_queue: Mutex<Vec<HeapId>>,
    finalizing: AtomicBool,
    since_gc: AtomicUsize,
    stats: Mutex<GcStats>,
    me: Weak<Vm>,
}

/// Proof that the current thread is inside the VM.
///
/// Holding it keeps collections from starting. Leaving the outermost
/// entry of a thread may trigger an automatic collection and runs pending
/// finalizers.
pub struct Entered<'v> {
    vm: &'v Vm,
    guard: Option<RwLockReadGuard<'v, ()>>,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        let tid = thread::current().id();
        let outermost = match self.vm.entered.get_mut(&tid) {
            Some(mut depth) => {
                *depth -= 1;
                *depth == 0
            }
            None => true,
        };
        if outermost {
            self.vm.entered.remove_if(&tid, |_, depth| *depth == 0);
        }
        drop(self.guard.take());
        if outermost {
            self.vm.after_exit();
        }
    }
}

impl Vm {
    /// Create a VM with the builtin class library
    pub fn new(options: VmOptions) -> VmResult<Arc<Vm>> {
        let vm = Arc::new_cyclic(|me| Vm {
            options,
            classes: RwLock::new(ClassRegistry::new()),
            heap: Mutex::new(Heap::new()),
            refs: RefTables::new(),
            world: RwLock::new(()),
            entered: DashMap::new(),
            pending: DashMap::new(),
            finalize_queue: Mutex::new(Vec::new()),
            finalizing: AtomicBool::new(false),
            since_gc: AtomicUsize::new(0),
            stats: Mutex::new(GcStats::default()),
            me: me.clone(),
        });
        builtin::install(&vm)?;
        tracing::debug!(classes = vm.class_count(), "vm initialized");
        Ok(vm)
    }

    /// Options the VM was created with
    pub fn options(&self) -> &VmOptions {
        &self.options
    }

    /// Owning handle to this VM
    pub fn arc(&self) -> VmResult<Arc<Vm>> {
        self.me
            .upgrade()
            .ok_or_else(|| VmError::RuntimeError("vm is shutting down".into()))
    }

    // ========================================================================
    // Classes
    // ========================================================================

    /// Define a class
    pub fn define_class(&self, def: ClassDef) -> VmResult<ClassId> {
        let name = def.name().to_string();
        let id = self.classes.write().define(def)?;
        tracing::trace!(class = %name, id = id.0, "class defined");
        Ok(id)
    }

    /// Class by id
    pub fn class(&self, id: ClassId) -> VmResult<Arc<Class>> {
        self.classes.read().class(id).cloned()
    }

    /// Class by path
    pub fn class_named(&self, name: &str) -> VmResult<Arc<Class>> {
        self.classes.read().require(name).cloned()
    }

    /// Number of defined classes
    pub fn class_count(&self) -> usize {
        self.classes.read().len()
    }

    pub(crate) fn with_classes<R>(&self, f: impl FnOnce(&ClassRegistry) -> R) -> R {
        f(&self.classes.read())
    }

    // ========================================================================
    // Entry and collection
    // ========================================================================

    /// Enter the VM on the current thread
    pub fn enter(&self) -> Entered<'_> {
        let guard = self.world.read_recursive();
        *self.entered.entry(thread::current().id()).or_insert(0) += 1;
        Entered {
            vm: self,
            guard: Some(guard),
        }
    }

    /// Whether the current thread is inside the VM
    pub fn is_entered(&self) -> bool {
        self.entered.contains_key(&thread::current().id())
    }

    fn after_exit(&self) {
        let threshold = self.options.gc_threshold;
        if threshold > 0 && self.since_gc.load(Ordering::Relaxed) >= threshold {
            if let Some(_world) = self.world.try_write() {
                self.collect_locked();
            }
        }
        if !self.finalize_queue.lock().is_empty() {
            self.run_finalizers();
        }
    }

    fn collect_locked(&self) {
        let mut roots = self.refs.roots();
        roots.extend(self.pending.iter().map(|e| *e.value()));
        self.with_classes(|classes| {
            for class in classes.iter() {
                roots.extend(class.statics_snapshot().iter().filter_map(|v| v.as_ref_id()));
            }
            let mut heap = self.heap.lock();
            let mut queue = self.finalize_queue.lock();
            gc::mark_sweep(&mut heap, classes, roots, &mut queue, &mut self.stats.lock());
        });
        self.since_gc.store(0, Ordering::Relaxed);
    }

    /// Run a full collection, then the finalizers it discovered.
    ///
    /// Has no effect when called from inside the VM (a native method or a
    /// managed body), where the world cannot be stopped.
    pub fn collect(&self) -> GcStats {
        if self.is_entered() {
            tracing::warn!("collect() called from inside the vm, skipped");
            return self.gc_stats();
        }
        {
            let _world = self.world.write();
            self.collect_locked();
        }
        self.run_finalizers();
        self.gc_stats()
    }

    /// Run queued finalizers. Returns the number run.
    pub fn run_finalizers(&self) -> usize {
        if self.finalizing.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let mut ran = 0;
        loop {
            let _entered = self.enter();
            let next = self.finalize_queue.lock().pop();
            let Some(id) = next else { break };
            match self.call_virtual(id, FINALIZE.0, FINALIZE.1, &[]) {
                Ok(_) => {}
                Err(Raise::Throw(thrown)) => {
                    tracing::debug!(object = %id, exception = %thrown, "finalizer threw");
                }
                Err(Raise::Fault(e)) => tracing::warn!(object = %id, error = %e, "finalizer failed"),
            }
            ran += 1;
        }
        self.finalizing.store(false, Ordering::Release);
        ran
    }

    /// Collector statistics
    pub fn gc_stats(&self) -> GcStats {
        self.stats.lock().clone()
    }

    /// Number of live heap objects
    pub fn live_objects(&self) -> usize {
        self.heap.lock().live_count()
    }

    /// Number of objects awaiting their finalizer
    pub fn pending_finalizers(&self) -> usize {
        self.finalize_queue.lock().len()
    }

    /// Number of live local references
    pub fn local_ref_count(&self) -> usize {
        self.refs.local_count()
    }

    /// Number of live global references
    pub fn global_ref_count(&self) -> usize {
        self.refs.global_count()
    }
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("options", &self.options)
            .field("classes", &self.class_count())
            .field("live_objects", &self.live_objects())
            .finish()
    }
}

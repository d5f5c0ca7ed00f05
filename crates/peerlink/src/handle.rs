//! Peer handle table
//!
//! Maps opaque 64-bit handles to native objects and owns the retain/release
//! protocol the managed side follows.
//!
//! # Handle layout
//!
//! ```text
//!  63            32 31             0
//! ┌────────────────┬────────────────┐
//! │   generation   │      slot      │
//! └────────────────┴────────────────┘
//! ```
//!
//! Slots start at 1 so a live handle is never zero. A slot is recycled only
//! after its object died with no retain outstanding, and its generation is
//! bumped on reuse, so an old handle for a recycled slot is detected as
//! stale instead of aliasing the new occupant.
//!
//! # Ownership
//!
//! The table holds a strong reference to an object exactly while its retain
//! count is positive. With no retain outstanding the entry keeps only a weak
//! reference: the handle keeps resolving while something else keeps the
//! object alive, and goes stale once it dies.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use crossbeam::queue::SegQueue;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::{BridgeError, BridgeResult};

/// A native object as seen by the bridge
pub type NativeObject = Arc<dyn Any + Send + Sync>;

// ============================================================================
// PeerHandle
// ============================================================================

/// Opaque handle naming a native object. Zero means "no object".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct PeerHandle(u64);

impl PeerHandle {
    /// The "no object" handle
    pub const NONE: PeerHandle = PeerHandle(0);

    #[inline]
    fn new(slot: u32, generation: u32) -> Self {
        PeerHandle(((generation as u64) << 32) | slot as u64)
    }

    /// From the raw integer the managed side stores
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        PeerHandle(raw)
    }

    /// From a managed `long`
    #[inline]
    pub const fn from_long(raw: i64) -> Self {
        PeerHandle(raw as u64)
    }

    /// Raw integer
    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// As a managed `long`
    #[inline]
    pub const fn as_long(self) -> i64 {
        self.0 as i64
    }

    /// Whether this is the zero handle
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    fn slot(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "PeerHandle::NONE")
        } else {
            write!(f, "PeerHandle({}@{})", self.slot(), self.generation())
        }
    }
}

impl fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Handle table statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleStats {
    /// Handles ever issued
    pub allocated: u64,
    /// Handles whose slot was reclaimed
    pub released: u64,
    /// Highest number of simultaneously live handles
    pub peak_live: usize,
    /// Retain operations (including retaining `handle_for`)
    pub retains: u64,
    /// Release operations that decremented a count
    pub releases: u64,
}

// ============================================================================
// HandleTable
// ============================================================================

struct Entry {
    object: Weak<dyn Any + Send + Sync>,
    pinned: Option<NativeObject>,
    retains: u64,
    identity: usize,
    generation: u32,
}

impl Entry {
    fn is_dead(&self) -> bool {
        self.retains == 0 && self.object.strong_count() == 0
    }
}

/// Thread-safe table of peer handles.
///
/// Operations lock at most one map shard at a time, except `handle_for`
/// which holds an identity shard while inserting the new entry.
pub struct HandleTable {
    entries: DashMap<u32, Entry>,
    identities: DashMap<usize, PeerHandle>,
    free_slots: SegQueue<(u32, u32)>,
    next_slot: AtomicU32,
    strict_release: bool,
    stats: Mutex<HandleStats>,
}

#[inline]
fn identity_of(object: &NativeObject) -> usize {
    Arc::as_ptr(object) as *const () as usize
}

impl HandleTable {
    /// Create an empty table. With `strict_release`, releasing a handle
    /// that has no retain outstanding is an error; otherwise it is logged
    /// and ignored.
    pub fn new(strict_release: bool) -> Self {
        Self {
            entries: DashMap::new(),
            identities: DashMap::new(),
            free_slots: SegQueue::new(),
            next_slot: AtomicU32::new(1),
            strict_release,
            stats: Mutex::new(HandleStats::default()),
        }
    }

    fn allocate_slot(&self) -> (u32, u32) {
        self.free_slots
            .pop()
            .unwrap_or_else(|| (self.next_slot.fetch_add(1, Ordering::Relaxed), 0))
    }

    /// Handle for `object`, optionally retaining it.
    ///
    /// `None` yields [`PeerHandle::NONE`]. A live object always maps to the
    /// same handle, however many times it is exposed.
    pub fn handle_for(&self, object: Option<&NativeObject>, retain: bool) -> PeerHandle {
        let Some(object) = object else {
            return PeerHandle::NONE;
        };
        let identity = identity_of(object);

        loop {
            let known = self.identities.get(&identity).map(|h| *h);
            if let Some(handle) = known {
                if self.attach(handle, identity, object, retain) {
                    return handle;
                }
                // Mapping outlived its entry; drop it and start over
                self.identities.remove_if(&identity, |_, h| *h == handle);
                continue;
            }

            match self.identities.entry(identity) {
                MapEntry::Occupied(_) => continue,
                MapEntry::Vacant(vacant) => {
                    let (slot, generation) = self.allocate_slot();
                    let handle = PeerHandle::new(slot, generation);
                    self.entries.insert(
                        slot,
                        Entry {
                            object: Arc::downgrade(object),
                            pinned: retain.then(|| object.clone()),
                            retains: retain as u64,
                            identity,
                            generation,
                        },
                    );
                    vacant.insert(handle);

                    let mut stats = self.stats.lock();
                    stats.allocated += 1;
                    stats.retains += retain as u64;
                    stats.peak_live = stats.peak_live.max(self.entries.len());
                    drop(stats);

                    tracing::debug!(%handle, retain, "peer handle issued");
                    return handle;
                }
            }
        }
    }

    fn attach(&self, handle: PeerHandle, identity: usize, object: &NativeObject, retain: bool) -> bool {
        let Some(mut entry) = self.entries.get_mut(&handle.slot()) else {
            return false;
        };
        if entry.generation != handle.generation() || entry.identity != identity {
            return false;
        }
        if retain {
            if entry.retains == 0 {
                entry.pinned = Some(object.clone());
            }
            entry.retains += 1;
            drop(entry);
            self.stats.lock().retains += 1;
        }
        true
    }

    /// The object behind `handle`. The retain count is unchanged.
    pub fn resolve(&self, handle: PeerHandle) -> BridgeResult<NativeObject> {
        if handle.is_none() {
            return Err(BridgeError::NullHandle);
        }
        let entry = self
            .entries
            .get(&handle.slot())
            .filter(|e| e.generation == handle.generation())
            .ok_or(BridgeError::StaleHandle(handle.as_raw()))?;
        entry
            .object
            .upgrade()
            .ok_or(BridgeError::StaleHandle(handle.as_raw()))
    }

    /// The object behind `handle`, as its concrete type
    pub fn resolve_as<T: Any + Send + Sync>(&self, handle: PeerHandle) -> BridgeResult<Arc<T>> {
        self.resolve(handle)?
            .downcast::<T>()
            .map_err(|_| BridgeError::HandleTypeMismatch {
                handle: handle.as_raw(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Increment the retain count
    pub fn retain(&self, handle: PeerHandle) -> BridgeResult<PeerHandle> {
        if handle.is_none() {
            return Err(BridgeError::NullHandle);
        }
        let stale = BridgeError::StaleHandle(handle.as_raw());
        let mut entry = self
            .entries
            .get_mut(&handle.slot())
            .filter(|e| e.generation == handle.generation())
            .ok_or_else(|| stale.clone())?;
        if entry.retains == 0 {
            entry.pinned = Some(entry.object.upgrade().ok_or(stale)?);
        }
        entry.retains += 1;
        let count = entry.retains;
        drop(entry);

        self.stats.lock().retains += 1;
        tracing::trace!(%handle, count, "peer handle retained");
        Ok(handle)
    }

    /// Decrement the retain count. When it reaches zero the table's strong
    /// reference is dropped, which may destroy the object. Releasing the
    /// zero handle is a no-op.
    pub fn release(&self, handle: PeerHandle) -> BridgeResult<()> {
        if handle.is_none() {
            return Ok(());
        }
        let unpinned = {
            let Some(mut entry) = self
                .entries
                .get_mut(&handle.slot())
                .filter(|e| e.generation == handle.generation())
            else {
                tracing::warn!(%handle, "release of stale peer handle");
                return Err(BridgeError::StaleHandle(handle.as_raw()));
            };
            if entry.retains == 0 {
                let dead = entry.is_dead();
                drop(entry);
                if dead {
                    self.reap(handle);
                    tracing::warn!(%handle, "release of stale peer handle");
                    return Err(BridgeError::StaleHandle(handle.as_raw()));
                }
                tracing::warn!(%handle, "release without outstanding retain");
                return if self.strict_release {
                    Err(BridgeError::OverRelease(handle.as_raw()))
                } else {
                    Ok(())
                };
            }
            entry.retains -= 1;
            if entry.retains == 0 {
                entry.pinned.take()
            } else {
                None
            }
        };
        self.stats.lock().releases += 1;

        if unpinned.is_some() {
            // May run the object's destructor, so no shard may be held here
            drop(unpinned);
            tracing::debug!(%handle, "peer handle unpinned");
            self.reap(handle);
        }
        Ok(())
    }

    /// Undo the retain taken for a wrapper that could not be created.
    /// Failures are logged rather than returned.
    pub(crate) fn release_abandoned(&self, handle: PeerHandle) -> bool {
        match self.release(handle) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%handle, error = %e, "release of abandoned peer handle failed");
                false
            }
        }
    }

    /// Remove the entry for `handle` if its object is gone and nothing retains it
    fn reap(&self, handle: PeerHandle) -> bool {
        let removed = self.entries.remove_if(&handle.slot(), |_, e| {
            e.generation == handle.generation() && e.is_dead()
        });
        let Some((slot, entry)) = removed else {
            return false;
        };
        self.identities.remove_if(&entry.identity, |_, h| *h == handle);
        self.free_slots.push((slot, entry.generation.wrapping_add(1)));
        self.stats.lock().released += 1;
        tracing::debug!(%handle, "peer handle reclaimed");
        true
    }

    /// Current retain count of `handle`
    pub fn retain_count(&self, handle: PeerHandle) -> BridgeResult<u64> {
        if handle.is_none() {
            return Err(BridgeError::NullHandle);
        }
        self.entries
            .get(&handle.slot())
            .filter(|e| e.generation == handle.generation())
            .map(|e| e.retains)
            .ok_or(BridgeError::StaleHandle(handle.as_raw()))
    }

    /// Whether `handle` currently resolves
    pub fn is_live(&self, handle: PeerHandle) -> bool {
        self.resolve(handle).is_ok()
    }

    /// Number of occupied slots
    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    /// Reclaim slots whose object died while only non-owning handles
    /// existed. Returns the number of slots reclaimed.
    pub fn sweep(&self) -> usize {
        let dead: Vec<PeerHandle> = self
            .entries
            .iter()
            .filter(|e| e.is_dead())
            .map(|e| PeerHandle::new(*e.key(), e.generation))
            .collect();
        dead.into_iter().filter(|h| self.reap(*h)).count()
    }

    /// Get statistics
    pub fn stats(&self) -> HandleStats {
        *self.stats.lock()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new(true)
    }
}

impl fmt::Debug for HandleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleTable")
            .field("live", &self.entries.len())
            .field("strict_release", &self.strict_release)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Tracked {
        drops: Arc<AtomicUsize>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tracked() -> (NativeObject, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        let obj: NativeObject = Arc::new(Tracked { drops: drops.clone() });
        (obj, drops)
    }

    #[test]
    fn test_none_maps_to_zero() {
        let table = HandleTable::default();
        assert_eq!(table.handle_for(None, true), PeerHandle::NONE);
        assert!(matches!(table.resolve(PeerHandle::NONE), Err(BridgeError::NullHandle)));
        assert!(table.release(PeerHandle::NONE).is_ok());
    }

    #[test]
    fn test_abandoned_release_drops_object_once() {
        let table = HandleTable::default();
        let (obj, drops) = tracked();
        let handle = table.handle_for(Some(&obj), true);
        drop(obj);

        assert!(table.release_abandoned(handle));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(!table.release_abandoned(handle));
        assert_eq!(table.live_count(), 0);
    }

    #[test]
    fn test_retained_object_survives_owner_drop() {
        let table = HandleTable::default();
        let (obj, drops) = tracked();
        let handle = table.handle_for(Some(&obj), true);
        assert!(!handle.is_none());
        drop(obj);

        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert!(table.resolve_as::<Tracked>(handle).is_ok());

        table.release(handle).unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(matches!(table.resolve(handle), Err(BridgeError::StaleHandle(_))));
        assert_eq!(table.live_count(), 0);
    }

    #[test]
    fn test_same_object_same_handle() {
        let table = HandleTable::default();
        let (obj, _) = tracked();
        let a = table.handle_for(Some(&obj), true);
        let b = table.handle_for(Some(&obj), false);
        let c = table.handle_for(Some(&obj.clone()), true);
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(table.retain_count(a).unwrap(), 2);
    }

    #[test]
    fn test_double_release_flagged() {
        let table = HandleTable::default();
        let (obj, _) = tracked();
        let handle = table.handle_for(Some(&obj), true);
        table.release(handle).unwrap();
        // Object still alive through `obj`: the handle resolves but owes nothing
        assert!(matches!(table.release(handle), Err(BridgeError::OverRelease(_))));

        drop(obj);
        assert!(matches!(table.release(handle), Err(BridgeError::StaleHandle(_))));
    }

    #[test]
    fn test_lenient_release() {
        let table = HandleTable::new(false);
        let (obj, _) = tracked();
        let handle = table.handle_for(Some(&obj), false);
        assert!(table.release(handle).is_ok());
        assert_eq!(table.retain_count(handle).unwrap(), 0);
    }

    #[test]
    fn test_typed_resolve_mismatch() {
        let table = HandleTable::default();
        let obj: NativeObject = Arc::new(7u32);
        let handle = table.handle_for(Some(&obj), false);
        assert_eq!(*table.resolve_as::<u32>(handle).unwrap(), 7);
        assert!(matches!(
            table.resolve_as::<String>(handle),
            Err(BridgeError::HandleTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_recycled_slot_detects_stale_handle() {
        let table = HandleTable::default();
        let (first, _) = tracked();
        let old = table.handle_for(Some(&first), true);
        drop(first);
        table.release(old).unwrap();

        let (second, _) = tracked();
        let new = table.handle_for(Some(&second), true);
        assert_eq!(new.slot(), old.slot());
        assert_ne!(new, old);
        assert!(matches!(table.resolve(old), Err(BridgeError::StaleHandle(_))));
        assert!(table.resolve(new).is_ok());
    }

    #[test]
    fn test_sweep_reclaims_unretained_dead() {
        let table = HandleTable::default();
        let (obj, _) = tracked();
        let handle = table.handle_for(Some(&obj), false);
        assert_eq!(table.sweep(), 0);
        drop(obj);
        assert!(!table.is_live(handle));
        assert_eq!(table.live_count(), 1);
        assert_eq!(table.sweep(), 1);
        assert_eq!(table.live_count(), 0);
    }

    #[test]
    fn test_retain_resurrects_pin() {
        let table = HandleTable::default();
        let (obj, drops) = tracked();
        let handle = table.handle_for(Some(&obj), false);
        table.retain(handle).unwrap();
        drop(obj);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        table.release(handle).unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_retain_release() {
        let table = Arc::new(HandleTable::default());
        let (obj, drops) = tracked();
        let handle = table.handle_for(Some(&obj), true);
        drop(obj);

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let table = table.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        table.retain(handle).unwrap();
                        assert!(table.resolve(handle).is_ok());
                        table.release(handle).unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(table.retain_count(handle).unwrap(), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        table.release(handle).unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stats() {
        let table = HandleTable::default();
        let (a, _) = tracked();
        let (b, _) = tracked();
        let ha = table.handle_for(Some(&a), true);
        let _hb = table.handle_for(Some(&b), true);
        drop(a);
        table.release(ha).unwrap();

        let stats = table.stats();
        assert_eq!(stats.allocated, 2);
        assert_eq!(stats.released, 1);
        assert_eq!(stats.peak_live, 2);
        assert_eq!(stats.retains, 2);
        assert_eq!(stats.releases, 1);
    }
}

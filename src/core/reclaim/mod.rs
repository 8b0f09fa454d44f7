//=========================================================================
// Native Resource Reclaimer
//=========================================================================
//
// Releases native (render-context) handles once every owner of the
// matching `NativeResource` has been dropped.
//
// Architecture:
// ```text
//   any thread                         render thread
//   ──────────                         ─────────────
//   NativeRegistry::track()  ──┐
//     └─ entry (Weak owner)    │ entries: Mutex<HashMap<TrackingId, Entry>>
//   last NativeResource drop ──┼─► reclamation channel ─► Reclaimer::reclaim()
//                              │                            ├─ remove entry
//                              │                            └─ NativeReleaser::release()
// ```
//
// Native handles belong to the render context, so a drop on any thread
// only enqueues the tracking id. The handle itself is released on the
// render thread during the scheduler's reclaim step.
//
// Guarantees:
// - Never released while an owner is alive (the id is only sent from
//   the `Drop` of the last `Arc` owner).
// - Released at most once (the entry is removed before release; an id
//   without an entry is ignored).
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, trace, warn};
use parking_lot::Mutex;

//=== Handle Types ========================================================

/// Opaque native handle value owned by the render context.
pub type RawHandle = u64;

/// Category of a native handle, passed back to the releaser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    Texture,
    Mesh,
    Material,
    Other,
}

/// Identifies one tracking entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackingId(u64);

//=== NativeReleaser ======================================================

/// Host callback that frees native handles on the render thread.
pub trait NativeReleaser: Send {
    fn release(&mut self, kind: NativeKind, raw: RawHandle);
}

impl<F> NativeReleaser for F
where
    F: FnMut(NativeKind, RawHandle) + Send,
{
    fn release(&mut self, kind: NativeKind, raw: RawHandle) {
        self(kind, raw)
    }
}

/// Releaser used when the host has not installed one. Only logs.
pub struct LogReleaser;

impl NativeReleaser for LogReleaser {
    fn release(&mut self, kind: NativeKind, raw: RawHandle) {
        trace!(target: "reclaim", "Released {:?} handle {:#x}", kind, raw);
    }
}

//=== NativeResource ======================================================

struct ResourceInner {
    id: TrackingId,
    kind: NativeKind,
    raw: RawHandle,
    reclaim: Sender<TrackingId>,
}

impl Drop for ResourceInner {
    fn drop(&mut self) {
        // Receiver lives as long as the Reclaimer; after shutdown there is
        // nobody left to release on, so a failed send is dropped silently.
        let _ = self.reclaim.send(self.id);
    }
}

/// Shared ownership of one native handle.
///
/// Cloning shares the handle. When the last clone is dropped the handle is
/// queued for release on the render thread.
#[derive(Clone)]
pub struct NativeResource {
    inner: Arc<ResourceInner>,
}

impl NativeResource {
    pub fn id(&self) -> TrackingId {
        self.inner.id
    }

    pub fn kind(&self) -> NativeKind {
        self.inner.kind
    }

    pub fn raw(&self) -> RawHandle {
        self.inner.raw
    }
}

impl PartialEq for NativeResource {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for NativeResource {}

impl fmt::Debug for NativeResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeResource")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("raw", &format_args!("{:#x}", self.inner.raw))
            .finish()
    }
}

//=== NativeRegistry ======================================================

struct Entry {
    kind: NativeKind,
    raw: RawHandle,
    owner: Weak<ResourceInner>,
}

struct RegistryShared {
    next_id: AtomicU64,
    entries: Mutex<HashMap<TrackingId, Entry>>,
}

/// Creates tracked native resources. Cheap to clone, usable from any thread.
#[derive(Clone)]
pub struct NativeRegistry {
    shared: Arc<RegistryShared>,
    reclaim: Sender<TrackingId>,
}

impl NativeRegistry {
    /// Starts tracking `raw` and returns its owning handle.
    pub fn track(&self, kind: NativeKind, raw: RawHandle) -> NativeResource {
        let id = TrackingId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));

        let inner = Arc::new(ResourceInner {
            id,
            kind,
            raw,
            reclaim: self.reclaim.clone(),
        });

        self.shared.entries.lock().insert(
            id,
            Entry {
                kind,
                raw,
                owner: Arc::downgrade(&inner),
            },
        );

        trace!(target: "reclaim", "Tracking {:?} handle {:#x} as {:?}", kind, raw, id);
        NativeResource { inner }
    }

    /// Number of handles not yet released.
    pub fn tracked_count(&self) -> usize {
        self.shared.entries.lock().len()
    }

    /// Returns `true` while the handle for `id` has not been released.
    pub fn is_tracked(&self, id: TrackingId) -> bool {
        self.shared.entries.lock().contains_key(&id)
    }

    /// Returns `true` while at least one owner of `id` is alive.
    pub fn is_reachable(&self, id: TrackingId) -> bool {
        self.shared
            .entries
            .lock()
            .get(&id)
            .is_some_and(|entry| entry.owner.strong_count() > 0)
    }

    fn take(&self, id: TrackingId) -> Option<Entry> {
        self.shared.entries.lock().remove(&id)
    }
}

//=== Reclaimer ===========================================================

/// Render-thread side of native resource tracking.
pub struct Reclaimer {
    registry: NativeRegistry,
    receiver: Receiver<TrackingId>,
    releaser: Box<dyn NativeReleaser>,
}

impl Reclaimer {
    pub fn new<R: NativeReleaser + 'static>(releaser: R) -> Self {
        let (reclaim, receiver) = unbounded();

        Self {
            registry: NativeRegistry {
                shared: Arc::new(RegistryShared {
                    next_id: AtomicU64::new(1),
                    entries: Mutex::new(HashMap::new()),
                }),
                reclaim,
            },
            receiver,
            releaser: Box::new(releaser),
        }
    }

    /// Handle for creating tracked resources on other threads.
    pub fn registry(&self) -> NativeRegistry {
        self.registry.clone()
    }

    /// Replaces the host releaser. Pending releases use the new one.
    pub fn set_releaser<R: NativeReleaser + 'static>(&mut self, releaser: R) {
        self.releaser = Box::new(releaser);
    }

    /// Releases every handle whose owners are gone. Returns how many were freed.
    pub fn reclaim(&mut self) -> usize {
        let mut released = 0;

        for id in self.receiver.try_iter() {
            let Some(entry) = self.registry.take(id) else {
                warn!(target: "reclaim", "{:?} already released, skipping", id);
                continue;
            };

            if entry.owner.strong_count() > 0 {
                warn!(target: "reclaim", "{:?} still owned at reclaim time, keeping it", id);
                self.registry.shared.entries.lock().insert(id, entry);
                continue;
            }

            self.releaser.release(entry.kind, entry.raw);
            released += 1;
        }

        if released > 0 {
            debug!(target: "reclaim", "Released {} native handle(s)", released);
        }

        released
    }
}

impl Default for Reclaimer {
    fn default() -> Self {
        Self::new(LogReleaser)
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

//=========================================================================
// Scene Lifecycle
//=========================================================================
//
// Owns the single active scene and swaps it atomically.
//
// State machine:
//   NONE ──set_scene(A)──► ACTIVE(A) ──set_scene(B)──► ACTIVE(B) ...
//                             │
//                             └─ set_scene(A) again: no-op
//
// Swap contract (serialized by the swap lock):
//   1. same scene (Arc identity) → return, nothing notified
//   2. old.pause()
//   3. new.resume()
//   4. install new
//
// Any thread may call `set_scene`. The slot lock is held only to read or
// install the current scene, never while a scene hook runs, so readers
// are not stalled behind a frame update.
//
// Scene hooks (update, key handlers, resume/pause) may call `set_scene`
// on their own lifecycle. Such a call is recorded as pending and applied
// once the hook has returned and the scene lock is released.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Arc;
use std::thread::{self, ThreadId};

use log::{debug, info};
use parking_lot::Mutex;

//=== Internal Dependencies ===============================================

use super::{ObjectId, SharedScene};
use crate::core::frame::Frame;
use crate::core::input::KeyEvent;

//=== SceneLifecycle ======================================================

#[derive(Default)]
pub struct SceneLifecycle {
    current: Mutex<Option<SharedScene>>,

    /// Serializes swaps so the pause/resume pair of one swap is never
    /// interleaved with another's.
    swap_lock: Mutex<()>,

    /// Swap requested from inside a scene hook. Last request wins.
    pending: Mutex<Option<SharedScene>>,

    /// Threads currently running a scene hook of this lifecycle.
    in_hook: Mutex<Vec<ThreadId>>,
}

impl SceneLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `scene` the active scene.
    ///
    /// Returns `false` if `scene` already was the active scene. When
    /// called from a scene hook the swap is deferred until the hook
    /// returns, and `true` is returned.
    pub fn set_scene(&self, scene: SharedScene) -> bool {
        if self.is_in_hook() {
            debug!(target: "lifecycle", "set_scene from a scene hook, deferring swap");
            *self.pending.lock() = Some(scene);
            return true;
        }

        let changed = self.swap(scene);
        self.apply_pending();
        changed
    }

    /// The active scene, if any.
    pub fn current(&self) -> Option<SharedScene> {
        self.current.lock().clone()
    }

    pub fn current_id(&self) -> Option<ObjectId> {
        self.current().map(|scene| scene.lock().id())
    }

    pub fn has_scene(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Returns `true` while a swap requested from a hook waits to be applied.
    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Advances the active scene by one frame. Returns `false` if none is set.
    pub fn update(&self, frame: &Frame) -> bool {
        let Some(scene) = self.current() else {
            return false;
        };
        self.run_hook(|| scene.lock().update(frame));
        self.apply_pending();
        true
    }

    /// Routes a key event to the active scene's handler chain.
    pub fn dispatch_key(&self, event: &KeyEvent) -> bool {
        let Some(scene) = self.current() else {
            return false;
        };
        let consumed = self.run_hook(|| scene.lock().dispatch_key(event));
        self.apply_pending();
        consumed
    }

    //--- Internal Helpers -------------------------------------------------

    fn swap(&self, scene: SharedScene) -> bool {
        let _swap = self.swap_lock.lock();

        let previous = self.current();
        if let Some(active) = previous.as_ref() {
            if Arc::ptr_eq(active, &scene) {
                debug!(target: "lifecycle", "Scene already active, ignoring set_scene");
                return false;
            }
            self.run_hook(|| active.lock().pause());
        }

        let (id, type_name) = self.run_hook(|| {
            let mut incoming = scene.lock();
            incoming.resume();
            (incoming.id(), incoming.type_name().to_owned())
        });

        info!(target: "lifecycle", "Active scene is now {:?} ({})", id, type_name);
        *self.current.lock() = Some(scene);
        true
    }

    fn apply_pending(&self) {
        loop {
            let next = self.pending.lock().take();
            let Some(next) = next else {
                break;
            };
            self.swap(next);
        }
    }

    fn is_in_hook(&self) -> bool {
        let me = thread::current().id();
        self.in_hook.lock().contains(&me)
    }

    fn run_hook<R>(&self, hook: impl FnOnce() -> R) -> R {
        let me = thread::current().id();
        self.in_hook.lock().push(me);
        let _leave = HookExit { lifecycle: self, thread: me };
        hook()
    }
}

/// Unregisters the hook thread even if the hook panics.
struct HookExit<'a> {
    lifecycle: &'a SceneLifecycle,
    thread: ThreadId,
}

impl Drop for HookExit<'_> {
    fn drop(&mut self) {
        let mut threads = self.lifecycle.in_hook.lock();
        if let Some(pos) = threads.iter().position(|t| *t == self.thread) {
            threads.swap_remove(pos);
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::input::KeyCode;
    use crate::core::scene::{Arguments, Scene, SceneBehavior, SceneTree};
    use std::any::Any;
    use std::time::Duration;

    #[derive(Default)]
    struct Counting {
        resumed: u32,
        paused: u32,
    }

    impl SceneBehavior for Counting {
        fn on_resume(&mut self, _arguments: &Arguments) {
            self.resumed += 1;
        }

        fn on_pause(&mut self) {
            self.paused += 1;
        }

        fn on_key(&mut self, _event: &KeyEvent) -> bool {
            true
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Trigger {
        Key,
        Update,
        Resume,
    }

    /// Switches its lifecycle to `next` from the hook named by `trigger`.
    struct Switcher {
        lifecycle: Arc<SceneLifecycle>,
        next: SharedScene,
        trigger: Trigger,
        requested: Option<bool>,
    }

    impl Switcher {
        fn switch_if(&mut self, hook: Trigger) {
            if self.trigger == hook {
                self.requested = Some(self.lifecycle.set_scene(Arc::clone(&self.next)));
            }
        }
    }

    impl SceneBehavior for Switcher {
        fn on_resume(&mut self, _arguments: &Arguments) {
            self.switch_if(Trigger::Resume);
        }

        fn update(&mut self, _tree: &mut SceneTree, _frame: &Frame) {
            self.switch_if(Trigger::Update);
        }

        fn on_key(&mut self, _event: &KeyEvent) -> bool {
            self.switch_if(Trigger::Key);
            true
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn switcher_scene(
        lifecycle: &Arc<SceneLifecycle>,
        next: &SharedScene,
        trigger: Trigger,
    ) -> SharedScene {
        let switcher = Switcher {
            lifecycle: Arc::clone(lifecycle),
            next: Arc::clone(next),
            trigger,
            requested: None,
        };
        Scene::new("switcher", Box::new(switcher)).into_shared()
    }

    /// Runs `call` on another thread and fails the test if it hangs.
    fn returns_in_time<R: Send + 'static>(call: impl FnOnce() -> R + Send + 'static) -> R {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let _ = done_tx.send(call());
        });
        done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("lifecycle call did not return")
    }

    fn counting_scene() -> SharedScene {
        Scene::new("counting", Box::new(Counting::default())).into_shared()
    }

    fn counts(scene: &SharedScene) -> (u32, u32) {
        let scene = scene.lock();
        let c = scene.behavior::<Counting>().unwrap();
        (c.paused, c.resumed)
    }

    #[test]
    fn same_scene_twice_resumes_once() {
        let lifecycle = SceneLifecycle::new();
        let scene = counting_scene();

        assert!(lifecycle.set_scene(Arc::clone(&scene)));
        assert!(!lifecycle.set_scene(Arc::clone(&scene)));

        assert_eq!(counts(&scene), (0, 1));
    }

    #[test]
    fn a_b_a_notification_counts() {
        let lifecycle = SceneLifecycle::new();
        let a = counting_scene();
        let b = counting_scene();

        lifecycle.set_scene(Arc::clone(&a));
        lifecycle.set_scene(Arc::clone(&b));
        lifecycle.set_scene(Arc::clone(&a));

        // A: resumed on first and third call, paused on the second only.
        assert_eq!(counts(&a), (1, 2));
        assert_eq!(counts(&b), (1, 1));
        assert!(a.lock().is_active());
        assert!(!b.lock().is_active());
    }

    #[test]
    fn a_b_a_b_pauses_a_twice() {
        let lifecycle = SceneLifecycle::new();
        let a = counting_scene();
        let b = counting_scene();

        for scene in [&a, &b, &a, &b] {
            lifecycle.set_scene(Arc::clone(scene));
        }

        assert_eq!(counts(&a), (2, 2));
        assert_eq!(counts(&b), (1, 2));
    }

    #[test]
    fn key_dispatch_without_scene_is_not_consumed() {
        let lifecycle = SceneLifecycle::new();
        assert!(!lifecycle.dispatch_key(&KeyEvent::down(KeyCode::Enter)));

        lifecycle.set_scene(counting_scene());
        assert!(lifecycle.dispatch_key(&KeyEvent::down(KeyCode::Enter)));
    }

    #[test]
    fn key_handler_can_switch_scenes() {
        let lifecycle = Arc::new(SceneLifecycle::new());
        let b = counting_scene();
        let a = switcher_scene(&lifecycle, &b, Trigger::Key);
        lifecycle.set_scene(Arc::clone(&a));

        let worker = Arc::clone(&lifecycle);
        let key = KeyEvent::down(KeyCode::Enter);
        let consumed = returns_in_time(move || worker.dispatch_key(&key));

        assert!(consumed);
        assert!(Arc::ptr_eq(&lifecycle.current().unwrap(), &b));
        assert!(!a.lock().is_active());
        assert_eq!(a.lock().behavior::<Switcher>().unwrap().requested, Some(true));
        assert_eq!(counts(&b), (0, 1));
        assert!(!lifecycle.has_pending());
    }

    #[test]
    fn update_hook_swap_lands_after_the_frame() {
        let lifecycle = Arc::new(SceneLifecycle::new());
        let b = counting_scene();
        let a = switcher_scene(&lifecycle, &b, Trigger::Update);
        lifecycle.set_scene(Arc::clone(&a));

        let worker = Arc::clone(&lifecycle);
        assert!(returns_in_time(move || worker.update(&Frame::default())));

        assert_eq!(lifecycle.current_id(), Some(b.lock().id()));
        assert!(b.lock().is_active());
        assert!(!a.lock().is_active());
    }

    #[test]
    fn resume_hook_can_redirect_to_another_scene() {
        let lifecycle = Arc::new(SceneLifecycle::new());
        let target = counting_scene();
        let splash = switcher_scene(&lifecycle, &target, Trigger::Resume);

        let worker = Arc::clone(&lifecycle);
        let entry = Arc::clone(&splash);
        assert!(returns_in_time(move || worker.set_scene(entry)));

        assert!(Arc::ptr_eq(&lifecycle.current().unwrap(), &target));
        assert_eq!(counts(&target), (0, 1));
        assert!(!splash.lock().is_active());
    }

    #[test]
    fn concurrent_swaps_leave_exactly_one_active() {
        let lifecycle = Arc::new(SceneLifecycle::new());
        let scenes: Vec<_> = (0..4).map(|_| counting_scene()).collect();

        let handles: Vec<_> = scenes
            .iter()
            .map(|scene| {
                let lifecycle = Arc::clone(&lifecycle);
                let scene = Arc::clone(scene);
                thread::spawn(move || {
                    for _ in 0..50 {
                        lifecycle.set_scene(Arc::clone(&scene));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let active = scenes.iter().filter(|s| s.lock().is_active()).count();
        assert_eq!(active, 1);

        let current = lifecycle.current().unwrap();
        assert!(current.lock().is_active());

        // Every scene alternates resume/pause; only the active one is ahead.
        for scene in &scenes {
            let (paused, resumed) = counts(scene);
            let expected_gap = u32::from(Arc::ptr_eq(scene, &current));
            assert_eq!(resumed - paused, expected_gap);
        }
    }
}

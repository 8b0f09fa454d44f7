//=========================================================================
// Frame Scheduler
//=========================================================================
//
// Drives one render-thread cycle.
//
// Cycle (strictly ordered, never overlapping):
//   1. DRAIN    run up to `drain_cap` deferred actions
//   2. ADVANCE  update the active scene with this cycle's Frame
//   3. RECLAIM  release native handles whose owners were dropped
//
// Key events are routed synchronously between cycles via
// `dispatch_key`, on the same thread.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, trace};

//=== Internal Dependencies ===============================================

use crate::core::frame::{Frame, HeadPose};
use crate::core::input::KeyEvent;
use crate::core::reclaim::{NativeRegistry, Reclaimer};
use crate::core::scene::SceneLifecycle;
use crate::core::tasks::{DeferredActionError, TaskQueue, TaskSubmitter};

//=== Constants ===========================================================

/// Deferred actions run per cycle unless configured otherwise.
pub const DEFAULT_DRAIN_CAP: usize = 16;

//=== CycleReport =========================================================

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub frame: u64,
    pub executed: usize,
    pub failed: usize,
    /// `false` if no scene was active.
    pub advanced: bool,
    pub released: usize,
}

//=== FrameClock ==========================================================

struct FrameClock {
    started: Instant,
    last: Option<Instant>,
    number: u64,
}

impl FrameClock {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            last: None,
            number: 0,
        }
    }

    fn tick(&mut self, pose: HeadPose) -> Frame {
        let now = Instant::now();
        let delta = self.last.map_or(Duration::ZERO, |last| now - last);
        self.last = Some(now);
        self.number += 1;

        Frame::new(self.number, delta, now - self.started, pose)
    }
}

//=== FrameScheduler ======================================================

pub struct FrameScheduler {
    tasks: TaskQueue,
    reclaimer: Reclaimer,
    lifecycle: Arc<SceneLifecycle>,
    drain_cap: usize,
    clock: FrameClock,
    pose: HeadPose,
}

impl FrameScheduler {
    /// # Panics
    /// Panics if `drain_cap` is zero.
    pub fn new(
        tasks: TaskQueue,
        reclaimer: Reclaimer,
        lifecycle: Arc<SceneLifecycle>,
        drain_cap: usize,
    ) -> Self {
        assert!(drain_cap > 0, "Drain cap must be positive");

        Self {
            tasks,
            reclaimer,
            lifecycle,
            drain_cap,
            clock: FrameClock::new(),
            pose: HeadPose::IDENTITY,
        }
    }

    //--- Handles ----------------------------------------------------------

    pub fn submitter(&self) -> TaskSubmitter {
        self.tasks.submitter()
    }

    pub fn natives(&self) -> NativeRegistry {
        self.reclaimer.registry()
    }

    pub fn lifecycle(&self) -> &Arc<SceneLifecycle> {
        &self.lifecycle
    }

    pub fn drain_cap(&self) -> usize {
        self.drain_cap
    }

    pub fn frames(&self) -> u64 {
        self.clock.number
    }

    /// Head pose used for the next cycle's Frame.
    pub fn set_pose(&mut self, pose: HeadPose) {
        self.pose = pose;
    }

    //--- Cycle ------------------------------------------------------------

    /// Runs DRAIN → ADVANCE → RECLAIM once.
    pub fn run_cycle(&mut self) -> CycleReport {
        let frame = self.clock.tick(self.pose);

        //--- Step 1: Deferred actions ---------------------------------------
        let (executed, failed) = match self.tasks.drain(self.drain_cap) {
            Ok(executed) => (executed, 0),
            Err(e) => {
                for failure in &e.failures {
                    report_failure(frame.number(), failure);
                }
                (e.executed, e.failures.len())
            }
        };

        //--- Step 2: Scene ---------------------------------------------------
        let advanced = self.lifecycle.update(&frame);

        //--- Step 3: Native resources ------------------------------------------
        let released = self.reclaimer.reclaim();

        trace!(
            target: "scheduler",
            "Frame {}: {} action(s), {} released",
            frame.number(),
            executed,
            released
        );

        CycleReport {
            frame: frame.number(),
            executed,
            failed,
            advanced,
            released,
        }
    }

    /// Routes `event` to the active scene. Returns `true` if consumed.
    pub fn dispatch_key(&self, event: &KeyEvent) -> bool {
        let consumed = self.lifecycle.dispatch_key(event);
        trace!(target: "scheduler", "{:?} consumed: {}", event, consumed);
        consumed
    }
}

fn report_failure(frame: u64, failure: &DeferredActionError) {
    match failure {
        DeferredActionError::Failed { source, .. } => {
            error!(target: "scheduler", "Frame {}: {}: {}", frame, failure, source);
        }
        DeferredActionError::Panicked { .. } => {
            error!(target: "scheduler", "Frame {}: {}", frame, failure);
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

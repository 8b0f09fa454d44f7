//=========================================================================
// Render Loop
//
// Drives the frame scheduler on the dedicated render thread.
//
// Responsibilities:
// - Collect host events (keys, head pose, shutdown) with a per-frame budget
// - Route key events to the active scene between cycles
// - Run DRAIN → ADVANCE → RECLAIM once per frame
// - Keep fixed pacing at the configured frame rate
//
// Notes:
// The render loop runs independently from the host layer. It owns the
// scheduler and talks to the host only through the HostEvent channel,
// so any thread may drive the headset without touching scene state.
//
//=========================================================================

//=== Standard Library Imports ============================================
use std::io;
use std::thread;
use std::time::{Duration, Instant};

//=== External Crates =====================================================
use crossbeam_channel::Receiver;
use log::{debug, info};

//=== Internal Modules ====================================================
use platform_bridge::{EventCollector, HostEvent, TickControl};
use scheduler::FrameScheduler;

pub mod frame;
pub mod input;
pub mod markup;
pub mod platform_bridge;
pub mod reclaim;
pub mod resource;
pub mod scene;
pub mod scheduler;
pub mod tasks;

//=== RenderLoop ==========================================================
//
// Owns the scheduler for the lifetime of the render thread.
//
pub(crate) struct RenderLoop {
    scheduler: FrameScheduler,
    collector: EventCollector,
    frame_duration: Duration,
}

impl RenderLoop {
    //--- Construction -----------------------------------------------------
    pub fn new(
        scheduler: FrameScheduler,
        events: Receiver<HostEvent>,
        frame_rate: f64,
        max_events_per_frame: usize,
    ) -> Self {
        Self {
            scheduler,
            collector: EventCollector::new(events, max_events_per_frame),
            frame_duration: Duration::from_secs_f64(1.0 / frame_rate),
        }
    }

    //--- spawn() ---------------------------------------------------------
    //
    // Runs the loop on a named background thread. The handle yields the
    // number of frames rendered.
    //
    pub fn spawn(self) -> io::Result<thread::JoinHandle<u64>> {
        thread::Builder::new()
            .name("visor-render".into())
            .spawn(move || self.run())
    }

    //--- run() -----------------------------------------------------------
    //
    // Each frame:
    //  1. Collects host events (exits on shutdown or disconnect)
    //  2. Applies the newest pose and dispatches key events
    //  3. Runs one scheduler cycle
    //  4. Sleeps to maintain fixed pacing
    //
    pub fn run(mut self) -> u64 {
        info!(target: "scheduler", "Render loop started ({:?} per frame)", self.frame_duration);

        loop {
            let frame_start = Instant::now();

            //--- Step 1: Gather host events ----------------------------------
            if self.collector.collect_frame() == TickControl::Exit {
                break;
            }

            //--- Step 2: Input ------------------------------------------------
            if let Some(pose) = self.collector.pose() {
                self.scheduler.set_pose(pose);
            }
            for key in self.collector.take_keys() {
                if !self.scheduler.dispatch_key(&key) {
                    debug!(target: "scheduler", "Unhandled {:?}", key);
                }
            }

            //--- Step 3: Frame cycle ------------------------------------------
            self.scheduler.run_cycle();

            //--- Step 4: Maintain pacing --------------------------------------
            let elapsed = frame_start.elapsed();
            if elapsed < self.frame_duration {
                thread::sleep(self.frame_duration - elapsed);
            }
        }

        let frames = self.scheduler.frames();
        info!(target: "scheduler", "Render loop exiting after {} frame(s)", frames);
        frames
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

//=========================================================================
// Platform Subsystem
//
// Desktop host: runs a Winit window that stands in for the headset and
// forwards its input to the render thread.
//
// Architecture:
// ```text
//  Main Thread:                     Render Thread:
//  ┌──────────────────────────┐    ┌──────────────────────┐
//  │  Winit Event Loop        │    │  RenderLoop          │
//  │   ↓                      │    │   ├─ EventCollector  │
//  │  InputProcessor          │    │   ├─ dispatch_key()  │
//  │   ├─ KeyCode mapping     │    │   └─ FrameScheduler  │
//  │   ├─ GestureDetector     │    │       DRAIN          │
//  │   └─ cursor → head pose  │    │       ADVANCE        │
//  │   ↓                      │    │       RECLAIM        │
//  │  crossbeam Sender ───────┼───►│                      │
//  └──────────────────────────┘    └──────────────────────┘
//                  HostEvent::{Key, Pose, Shutdown}
// ```
//
// Key Design Decisions:
// - **Events sent immediately**: key events carry gesture timing, so they
//   are forwarded as they happen rather than batched per redraw
// - **Graceful channel disconnect**: if the render thread dies, the host
//   logs a warning and keeps running so the window can still be closed
// - **Main thread requirement**: Winit mandates the main thread on
//   macOS/iOS, so this runs on the thread that called `Engine::run()`
//
//=========================================================================

//=== Submodules ==========================================================

mod gesture;
mod input_processor;

//=== External Crates =====================================================

use std::time::Instant;

use crossbeam_channel::Sender;
use log::*;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

//=== Internal Imports ====================================================

use crate::config::EngineConfig;
use crate::core::input::KeyEvent;
use crate::core::platform_bridge::{HostEvent, PlatformError};
use gesture::GestureDetector;
use input_processor::InputProcessor;

//=== Platform ============================================================

/// Window manager and input forwarder.
///
/// Not Send: lives on the main thread. Talks to the render thread only
/// through the event sender.
pub(crate) struct Platform {
    /// OS window handle (None until `resumed()` called).
    window: Option<Window>,

    title: String,
    size: (u32, u32),

    /// Channel to the render thread.
    event_sender: Sender<HostEvent>,

    input_processor: InputProcessor,
}

impl Platform {
    //--- Construction -----------------------------------------------------

    /// Does not create the window yet; that happens lazily in `resumed()`.
    pub fn new(event_sender: Sender<HostEvent>, config: &EngineConfig) -> Self {
        info!(target: "platform", "Platform subsystem initialized");
        Self {
            window: None,
            title: config.window.title.clone(),
            size: (config.window.width, config.window.height),
            event_sender,
            input_processor: InputProcessor::new(GestureDetector::new(
                config.long_press(),
                config.double_tap(),
            )),
        }
    }

    //--- Execution --------------------------------------------------------

    /// Runs the Winit event loop until the window is closed.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] if the event loop cannot be created or
    /// fails while running.
    pub fn run(mut self) -> Result<(), PlatformError> {
        debug!(target: "platform", "Starting Winit event loop");

        let event_loop = EventLoop::new().map_err(PlatformError::EventLoopCreation)?;

        event_loop
            .run_app(&mut self)
            .map_err(PlatformError::EventLoopExecution)
    }

    //--- Internal Helpers -------------------------------------------------

    fn send(&self, event: HostEvent) {
        if self.event_sender.send(event).is_err() {
            warn!(target: "platform", "Render thread gone, dropping {:?}", event);
        }
    }

    fn send_keys(&self, keys: Vec<KeyEvent>) {
        for key in keys {
            trace!(target: "platform", "Key {:?}", key);
            self.send(HostEvent::Key(key));
        }
    }

    fn shutdown(&self, event_loop: &ActiveEventLoop) {
        self.send(HostEvent::Shutdown);
        event_loop.exit();
    }

    #[cfg(test)]
    pub(crate) fn window(&self) -> Option<&Window> {
        self.window.as_ref()
    }
}

//=== Winit Integration ===================================================

impl ApplicationHandler for Platform {
    /// Creates the window if it doesn't exist yet (startup or mobile resume).
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            debug!(target: "platform", "Window already exists (mobile resume?)");
            return;
        }

        let attrs = WindowAttributes::default()
            .with_title(self.title.clone())
            .with_inner_size(LogicalSize::new(self.size.0, self.size.1));

        match event_loop.create_window(attrs) {
            Ok(window) => {
                let size = window.inner_size();
                info!(
                    target: "platform",
                    "Window created: {}x{} @ {}x DPI",
                    size.width,
                    size.height,
                    window.scale_factor()
                );
                self.input_processor.resize(size.width, size.height);
                window.request_redraw();
                self.window = Some(window);
            }
            Err(e) => {
                error!(target: "platform", "Window creation failed: {}", e);
                self.shutdown(event_loop);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                info!(target: "platform", "Window close requested");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(size) => {
                self.input_processor.resize(size.width, size.height);
            }

            WindowEvent::CursorMoved { position, .. } => {
                let pose = self
                    .input_processor
                    .process_cursor(position.x as f32, position.y as f32);
                self.send(HostEvent::Pose(pose));
            }

            WindowEvent::KeyboardInput { event: key_event, .. } => {
                let keys = self.input_processor.process_key_event(&key_event, Instant::now());
                self.send_keys(keys);
            }

            WindowEvent::RedrawRequested => {
                let keys = self.input_processor.poll(Instant::now());
                self.send_keys(keys);

                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            _ => {}
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

//=========================================================================
// Platform Bridge Interface
//=========================================================================
//
// Host-to-render-thread interface types (events and errors).
//
// Defines the contract between whatever drives the headset (winit window,
// native runtime, test harness) and the render thread.
//
//=========================================================================

//=== External Dependencies ===============================================

use thiserror::Error;

//=== Internal Dependencies ===============================================

use crate::core::frame::HeadPose;
use crate::core::input::KeyEvent;

//=== HostEvent ===========================================================

/// Events sent from the host to the render thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    /// Key transition or recognized gesture.
    Key(KeyEvent),

    /// Latest head pose from the sensors. Only the newest one per frame is used.
    Pose(HeadPose),

    /// Host is going away; the render loop exits.
    Shutdown,
}

//=== PlatformError =======================================================

/// Host initialization and runtime errors.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Event loop creation failed (OS-level issue).
    #[error("event loop creation failed")]
    EventLoopCreation(#[source] winit::error::EventLoopError),

    /// Event loop execution error.
    #[error("event loop error")]
    EventLoopExecution(#[source] winit::error::EventLoopError),

    /// Render thread could not be started.
    #[error("failed to spawn render thread")]
    RenderThread(#[source] std::io::Error),

    /// Render thread panicked.
    #[error("render thread panicked")]
    RenderThreadPanicked,
}

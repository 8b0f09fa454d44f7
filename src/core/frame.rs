//=========================================================================
// Frame
//=========================================================================
//
// Immutable per-cycle context passed down the scene update traversal.
//
// A new `Frame` is produced by the scheduler at the start of every cycle
// and dropped at its end. Consumers only ever see `&Frame`.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::time::Duration;

use glam::{Quat, Vec3};

//=== HeadPose ============================================================

/// Head position and orientation reported by the headset sensors.
///
/// Orientation maps the head's local frame into world space; the viewer
/// looks down the local −Z axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadPose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl HeadPose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self { position, orientation }
    }

    /// Unit vector the viewer is looking along, in world space.
    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }
}

impl Default for HeadPose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

//=== Frame ===============================================================

/// Timing and sensor state for one scheduler cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    number: u64,
    delta: Duration,
    elapsed: Duration,
    pose: HeadPose,
}

impl Frame {
    pub fn new(number: u64, delta: Duration, elapsed: Duration, pose: HeadPose) -> Self {
        Self { number, delta, elapsed, pose }
    }

    /// Monotonic cycle counter, starting at 1 for the first cycle.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Time since the previous cycle started.
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Delta in seconds, for integrating motion.
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Time since the scheduler's first cycle.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn pose(&self) -> &HeadPose {
        &self.pose
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO, HeadPose::IDENTITY)
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

//=========================================================================
// Look-At Detection
//=========================================================================
//
// Tracks whether the viewer's gaze rests on a target object and reports
// start / continue / end transitions to a listener.
//
// Usage: keep one detector per target in the scene behavior and call
// `update()` with the tree handed to `SceneBehavior::update` once per
// frame.
//
//=========================================================================

//=== External Dependencies ===============================================

use glam::Vec3;

//=== Internal Dependencies ===============================================

use super::{ObjectId, SceneTree};
use crate::core::frame::Frame;

//=== LookState ===========================================================

/// Transition reported by [`LookingStateDetector::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookState {
    /// Gaze entered the target this frame.
    Start,

    /// Gaze stayed on the target.
    Looking,

    /// Gaze left the target, or the target was hidden or removed.
    End,
}

//=== LookListener ========================================================

/// Receives look transitions for one target. All hooks default to no-ops.
pub trait LookListener: Send {
    fn on_look_start(&mut self, _target: ObjectId, _frame: &Frame) {}

    fn on_looking(&mut self, _target: ObjectId, _frame: &Frame) {}

    fn on_look_end(&mut self, _target: ObjectId, _frame: &Frame) {}
}

//=== LookingStateDetector ================================================

pub struct LookingStateDetector<L: LookListener> {
    target: ObjectId,
    listener: L,
    looking: bool,
}

impl<L: LookListener> LookingStateDetector<L> {
    pub fn new(target: ObjectId, listener: L) -> Self {
        Self {
            target,
            listener,
            looking: false,
        }
    }

    pub fn target(&self) -> ObjectId {
        self.target
    }

    pub fn is_looking(&self) -> bool {
        self.looking
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// Evaluates the gaze for `frame` and notifies the listener.
    pub fn update(&mut self, tree: &SceneTree, frame: &Frame) -> Option<LookState> {
        let looking_now = tree.is_looking_at(self.target, frame);

        let state = match (self.looking, looking_now) {
            (false, true) => {
                self.listener.on_look_start(self.target, frame);
                Some(LookState::Start)
            }
            (true, true) => {
                self.listener.on_looking(self.target, frame);
                Some(LookState::Looking)
            }
            (true, false) => {
                self.listener.on_look_end(self.target, frame);
                Some(LookState::End)
            }
            (false, false) => None,
        };

        self.looking = looking_now;
        state
    }
}

//=== Geometry ============================================================

/// Ray/sphere test. `direction` must be normalized.
pub(super) fn ray_hits_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> bool {
    let to_center = center - origin;
    let dist_sq = to_center.length_squared();
    let radius_sq = radius * radius;

    // Eye inside the bounds.
    if dist_sq <= radius_sq {
        return true;
    }

    let along = to_center.dot(direction);
    if along < 0.0 {
        return false;
    }

    dist_sq - along * along <= radius_sq
}

//=========================================================================
// Unit Tests
//=========================================================================

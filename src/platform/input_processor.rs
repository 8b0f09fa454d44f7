//=========================================================================
// Input Processor
//=========================================================================
//
// Converts Winit window events into host events for the render thread.
//
// Architecture:
//   KeyboardInput → KeyCode → GestureDetector → HostEvent::Key (0..n)
//   CursorMoved   → yaw/pitch preview pose    → HostEvent::Pose
//
// On a desktop there is no headset, so the cursor position stands in for
// head orientation: the window's horizontal extent spans ±90° of yaw and
// the vertical extent ±45° of pitch. Unmapped keys are filtered.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};
use std::time::Instant;

use glam::{EulerRot, Quat, Vec3};
use winit::{
    event::{ElementState, KeyEvent as WinitKeyEvent},
    keyboard::{KeyCode as WinitKeyCode, PhysicalKey},
};

//=== Internal Dependencies ===============================================

use super::gesture::GestureDetector;
use crate::core::frame::HeadPose;
use crate::core::input::{KeyCode, KeyEvent};

//=== InputProcessor ======================================================

pub(crate) struct InputProcessor {
    gestures: GestureDetector,
    window_size: (f32, f32),
}

impl InputProcessor {
    //--- Construction -----------------------------------------------------

    pub(crate) fn new(gestures: GestureDetector) -> Self {
        Self {
            gestures,
            window_size: (1.0, 1.0),
        }
    }

    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        self.window_size = (width.max(1) as f32, height.max(1) as f32);
    }

    //--- Event Processing -------------------------------------------------

    /// Converts a Winit key event into key events (filters unmapped keys).
    pub(crate) fn process_key_event(&mut self, key_event: &WinitKeyEvent, now: Instant) -> Vec<KeyEvent> {
        match key_event.physical_key {
            PhysicalKey::Code(code) => self.process_key(code, key_event.state, now),
            _ => Vec::new(),
        }
    }

    fn process_key(&mut self, code: WinitKeyCode, state: ElementState, now: Instant) -> Vec<KeyEvent> {
        let key_code = KeyCode::from(code);
        if matches!(key_code, KeyCode::Unidentified) {
            return Vec::new();
        }

        // Winit reports OS auto-repeat as further presses of a held key.
        match state {
            ElementState::Pressed => self.gestures.press(key_code, now),
            ElementState::Released => self.gestures.release(key_code, now),
        }
    }

    /// Long presses due for keys held without auto-repeat.
    pub(crate) fn poll(&mut self, now: Instant) -> Vec<KeyEvent> {
        self.gestures.poll(now)
    }

    /// Preview head pose for a cursor position in physical pixels.
    pub(crate) fn process_cursor(&self, x: f32, y: f32) -> HeadPose {
        let (width, height) = self.window_size;
        let nx = (x / width).clamp(0.0, 1.0) - 0.5;
        let ny = (y / height).clamp(0.0, 1.0) - 0.5;

        let yaw = -nx * 2.0 * FRAC_PI_2;
        let pitch = -ny * 2.0 * FRAC_PI_4;

        HeadPose::new(Vec3::ZERO, Quat::from_euler(EulerRot::YXZ, yaw, pitch, 0.0))
    }
}

//=========================================================================
// Winit Conversions
//=========================================================================

/// Converts Winit physical key codes to engine key codes.
///
/// Maps A-Z, 0-9, arrows and the keys headset buttons are reported as.
/// Everything else becomes `KeyCode::Unidentified`.
impl From<WinitKeyCode> for KeyCode {
    fn from(code: WinitKeyCode) -> Self {
        use WinitKeyCode::*;
        match code {
            //--- Digits -------------------------------------------------------

            Digit0 => KeyCode::Digit0,
            Digit1 => KeyCode::Digit1,
            Digit2 => KeyCode::Digit2,
            Digit3 => KeyCode::Digit3,
            Digit4 => KeyCode::Digit4,
            Digit5 => KeyCode::Digit5,
            Digit6 => KeyCode::Digit6,
            Digit7 => KeyCode::Digit7,
            Digit8 => KeyCode::Digit8,
            Digit9 => KeyCode::Digit9,

            //--- Letters ------------------------------------------------------

            KeyA => KeyCode::KeyA,
            KeyB => KeyCode::KeyB,
            KeyC => KeyCode::KeyC,
            KeyD => KeyCode::KeyD,
            KeyE => KeyCode::KeyE,
            KeyF => KeyCode::KeyF,
            KeyG => KeyCode::KeyG,
            KeyH => KeyCode::KeyH,
            KeyI => KeyCode::KeyI,
            KeyJ => KeyCode::KeyJ,
            KeyK => KeyCode::KeyK,
            KeyL => KeyCode::KeyL,
            KeyM => KeyCode::KeyM,
            KeyN => KeyCode::KeyN,
            KeyO => KeyCode::KeyO,
            KeyP => KeyCode::KeyP,
            KeyQ => KeyCode::KeyQ,
            KeyR => KeyCode::KeyR,
            KeyS => KeyCode::KeyS,
            KeyT => KeyCode::KeyT,
            KeyU => KeyCode::KeyU,
            KeyV => KeyCode::KeyV,
            KeyW => KeyCode::KeyW,
            KeyX => KeyCode::KeyX,
            KeyY => KeyCode::KeyY,
            KeyZ => KeyCode::KeyZ,

            //--- Arrows (swipes) ------------------------------------------------

            ArrowUp => KeyCode::ArrowUp,
            ArrowDown => KeyCode::ArrowDown,
            ArrowLeft => KeyCode::ArrowLeft,
            ArrowRight => KeyCode::ArrowRight,

            //--- Special ------------------------------------------------------

            Space => KeyCode::Space,
            Enter | NumpadEnter => KeyCode::Enter,
            Escape | BrowserBack => KeyCode::Escape,
            Tab => KeyCode::Tab,
            Backspace => KeyCode::Backspace,
            Delete => KeyCode::Delete,

            _ => KeyCode::Unidentified,
        }
    }
}

//=========================================================================
// Tests
//=========================================================================

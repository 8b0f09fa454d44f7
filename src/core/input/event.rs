//=========================================================================
// Key Event Types
//
// Defines the engine representation of headset and keyboard key input.
//
// This module abstracts away host-specific input (winit, headset SDK
// callbacks) into a unified format routed to the active scene.
//
// Responsibilities:
// - Represent physical keys in a stable, portable way
// - Represent key transitions and recognized gestures (short press,
//   long press, double tap) with their repeat count
//
// Event Flow:
// ```text
// Host (winit / headset SDK)
//         ↓
//    GestureDetector (platform)
//         ↓
//    KeyEvent (this module)
//         ↓
//    Scene handler chain (consumed → stop)
// ```
//
//=========================================================================

//=== KeyCode =============================================================

/// Physical key identifier.
///
/// Represents the physical key location, not the character produced.
/// Headset buttons are reported by the host under the closest physical
/// equivalent (`Escape` for back, `Enter` for touchpad click).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    //--- Numeric Keys -----------------------------------------------------

    /// Number row: 0-9
    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,

    //--- Alphabetic Keys --------------------------------------------------

    /// Letter keys: A-Z (physical location, not character)
    KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI,
    KeyJ, KeyK, KeyL, KeyM, KeyN, KeyO, KeyP, KeyQ, KeyR,
    KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ,

    //--- Arrow Keys -------------------------------------------------------

    /// Directional navigation keys (also headset swipe directions)
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    ArrowUp,

    //--- Special Keys -----------------------------------------------------

    /// Spacebar
    Space,

    /// Return/Enter key (headset touchpad click)
    Enter,

    /// Escape key (headset back button)
    Escape,

    /// Tab key
    Tab,

    /// Backspace key
    Backspace,

    /// Delete key
    Delete,

    /// Fallback for keys not explicitly mapped by the host.
    Unidentified,
}

//=== KeyAction ===========================================================

/// What happened to a key.
///
/// `Down`/`Up` are raw transitions. The remaining variants are gestures
/// recognized by the host over a sequence of transitions and are delivered
/// in addition to the raw transitions, never instead of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    /// Key pressed, or auto-repeated while held (`repeat_count > 0`).
    Down,

    /// Key released.
    Up,

    /// Pressed and released before the long-press threshold.
    ShortPress,

    /// Held past the long-press threshold. Delivered once per hold.
    LongPress,

    /// Second short press inside the double-tap window.
    DoubleTap,
}

//=== KeyEvent ============================================================

/// A single key event routed to the active scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub action: KeyAction,

    /// Number of auto-repeats seen during the current hold.
    pub repeat_count: u32,
}

impl KeyEvent {
    pub fn new(code: KeyCode, action: KeyAction, repeat_count: u32) -> Self {
        Self { code, action, repeat_count }
    }

    pub fn down(code: KeyCode) -> Self {
        Self::new(code, KeyAction::Down, 0)
    }

    pub fn up(code: KeyCode) -> Self {
        Self::new(code, KeyAction::Up, 0)
    }

    /// Returns `true` for recognized gestures (anything but raw transitions).
    pub fn is_gesture(&self) -> bool {
        !matches!(self.action, KeyAction::Down | KeyAction::Up)
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

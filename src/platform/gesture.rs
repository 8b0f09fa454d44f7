//=========================================================================
// Gesture Detector
//=========================================================================
//
// Turns raw key transitions into headset-style gestures.
//
// Per key:
//   press                  → Down(0)
//   auto-repeat while held → Down(n), n = repeats so far
//   held ≥ long_press      → LongPress(n), once per hold
//   release                → Up(n)
//   release < long_press   → ShortPress, or DoubleTap if the previous
//                            short press ended within double_tap
//
// Gestures are emitted in addition to Down/Up, after the transition
// that completed them. A double tap consumes the pending tap, so three
// quick taps yield ShortPress, DoubleTap, ShortPress.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;
use std::time::{Duration, Instant};

//=== Internal Dependencies ===============================================

use crate::core::input::{KeyAction, KeyCode, KeyEvent};

//=== Hold ================================================================

struct Hold {
    since: Instant,
    repeats: u32,
    long_fired: bool,
}

//=== GestureDetector =====================================================

pub(crate) struct GestureDetector {
    long_press: Duration,
    double_tap: Duration,
    held: HashMap<KeyCode, Hold>,
    last_tap: HashMap<KeyCode, Instant>,
}

impl GestureDetector {
    pub(crate) fn new(long_press: Duration, double_tap: Duration) -> Self {
        Self {
            long_press,
            double_tap,
            held: HashMap::new(),
            last_tap: HashMap::new(),
        }
    }

    /// Key went down, or the OS auto-repeated a held key.
    pub(crate) fn press(&mut self, code: KeyCode, now: Instant) -> Vec<KeyEvent> {
        let mut out = Vec::with_capacity(2);

        match self.held.get_mut(&code) {
            Some(hold) => {
                hold.repeats += 1;
                out.push(KeyEvent::new(code, KeyAction::Down, hold.repeats));
                if !hold.long_fired && now.duration_since(hold.since) >= self.long_press {
                    hold.long_fired = true;
                    out.push(KeyEvent::new(code, KeyAction::LongPress, hold.repeats));
                }
            }
            None => {
                self.held.insert(
                    code,
                    Hold {
                        since: now,
                        repeats: 0,
                        long_fired: false,
                    },
                );
                out.push(KeyEvent::down(code));
            }
        }

        out
    }

    pub(crate) fn release(&mut self, code: KeyCode, now: Instant) -> Vec<KeyEvent> {
        let Some(hold) = self.held.remove(&code) else {
            // Release without a press we saw (focus changes); report it as is.
            return vec![KeyEvent::up(code)];
        };

        let mut out = Vec::with_capacity(2);
        let held_for = now.duration_since(hold.since);

        if !hold.long_fired && held_for >= self.long_press {
            out.push(KeyEvent::new(code, KeyAction::LongPress, hold.repeats));
        }
        out.push(KeyEvent::new(code, KeyAction::Up, hold.repeats));

        if held_for < self.long_press {
            let is_double = self
                .last_tap
                .get(&code)
                .is_some_and(|last| now.duration_since(*last) <= self.double_tap);

            if is_double {
                self.last_tap.remove(&code);
                out.push(KeyEvent::new(code, KeyAction::DoubleTap, 0));
            } else {
                self.last_tap.insert(code, now);
                out.push(KeyEvent::new(code, KeyAction::ShortPress, 0));
            }
        }

        out
    }

    /// Fires long presses for keys held without auto-repeat.
    pub(crate) fn poll(&mut self, now: Instant) -> Vec<KeyEvent> {
        let mut out = Vec::new();
        for (code, hold) in &mut self.held {
            if !hold.long_fired && now.duration_since(hold.since) >= self.long_press {
                hold.long_fired = true;
                out.push(KeyEvent::new(*code, KeyAction::LongPress, hold.repeats));
            }
        }
        out
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

//=========================================================================
// Platform Bridge
//=========================================================================
//
// Bridges the host layer (winit window, headset runtime) with the render
// thread.
//
// Components:
// - `interface`: Event types and error definitions (the contract)
// - `event_collector`: Render-side event collection with a per-frame budget
//
//=========================================================================

//=== Module Declarations =================================================

pub(crate) mod event_collector;
pub(crate) mod interface;

//=== Public API ==========================================================

pub(crate) use event_collector::{EventCollector, TickControl};
pub use interface::{HostEvent, PlatformError};

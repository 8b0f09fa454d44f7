//=========================================================================
// Input
//=========================================================================
//
// Key input types delivered by the host and routed to the active scene.
//
// Input is never deferred through the task queue: the scene lifecycle
// manager hands each `KeyEvent` synchronously to the active scene's
// handler chain, which stops at the first handler reporting the event
// as consumed.
//
//=========================================================================

//=== Module Declarations =================================================

pub mod event;

//=== Public API ==========================================================

pub use event::{KeyAction, KeyCode, KeyEvent};

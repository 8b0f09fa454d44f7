//=========================================================================
// Visor Engine: Library Root
//
// This crate defines the public API surface of the Visor engine, a
// real-time scene framework for head-mounted displays.
//
// Responsibilities:
// - Expose the engine facade (`Engine`, `EngineBuilder`, `EngineContext`)
// - Expose the scene, markup, task and reclaim systems under `core`
// - Keep the desktop host (`platform`) hidden from end users
//
// Typical usage:
// ```no_run
// use visor_engine::EngineBuilder;
//
// fn main() {
//     EngineBuilder::new().build().run().unwrap();
// }
// ```
//
//=========================================================================

//--- Public Modules ------------------------------------------------------
//
// `core` contains the engine systems: scene graph and lifecycle, markup
// builder, cross-thread task queue, native reclaimer and frame scheduler.
//
// `config` holds the TOML-loadable runtime settings.
//
// `prelude` re-exports the types most applications need.
//
pub mod config;
pub mod core;
pub mod prelude;

//--- Internal Modules ----------------------------------------------------
//
// `platform` contains the Winit host (window, key gestures, preview head
// pose) and is kept private, as it is not part of the public API surface.
//
// `engine` defines the main engine entry point and initialization logic.
//
mod engine;
mod platform;

//--- Public Exports ------------------------------------------------------

pub use config::{ConfigError, EngineConfig, WindowConfig};
pub use engine::{Engine, EngineBuilder, EngineContext};

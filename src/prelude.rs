//=========================================================================
// Prelude
//=========================================================================
//
// Convenience module that re-exports commonly used types and traits.
//
// Usage:
//   use visor_engine::prelude::*;
//
//=========================================================================

//=== Public API ==========================================================

// Engine core
pub use crate::config::EngineConfig;
pub use crate::engine::{Engine, EngineBuilder, EngineContext};

// Frames and input
pub use crate::core::frame::{Frame, HeadPose};
pub use crate::core::input::{KeyAction, KeyCode, KeyEvent};

// Scene system
pub use crate::core::scene::{
    Arguments, Behavior, Scene, SceneBehavior, SceneLifecycle, SceneObject, SceneTree,
    SharedScene,
};

// Markup
pub use crate::core::markup::{AttributeRegistry, BuildError, ObjectFactory, SceneBuilder};

// Resources and deferred work
pub use crate::core::platform_bridge::HostEvent;
pub use crate::core::resource::{ResolvedResource, ResourceRef, ResourceResolver};
pub use crate::core::tasks::TaskSubmitter;

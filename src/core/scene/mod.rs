//=========================================================================
// Scene System
//=========================================================================
//
// Scene tree root, scene lifecycle, and look-at detection.
//
// Architecture:
//   SceneLifecycle
//     └─ current: Option<SharedScene>     (exactly one active scene)
//          └─ Scene
//               ├─ behavior: Box<dyn SceneBehavior>
//               └─ tree: SceneTree              (owned objects)
//
// Flow:
//   set_scene() → old.pause() → new.resume() → install
//   FrameScheduler → Scene::update() → behavior.update(tree)
//                                    → SceneObject::update() (depth-first)
//   KeyEvent → Scene::dispatch_key() → behavior → objects (first consumer wins)
//
// Threading contract:
//   The scene tree is mutated only on the render thread. Other threads
//   that need to change the tree submit a deferred action through the
//   `TaskSubmitter`. The scene mutex makes this memory-safe but does not
//   order such mutations relative to the frame; that ordering is the
//   caller's responsibility.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::any::Any;
use std::sync::Arc;

use glam::Mat4;
use parking_lot::Mutex;

//=== Internal Dependencies ===============================================

use crate::core::frame::Frame;
use crate::core::input::KeyEvent;

//=== Module Declarations =================================================

mod lifecycle;
mod looking;
mod object;
mod tree;

//=== Public API ==========================================================

pub use lifecycle::SceneLifecycle;
pub use looking::{LookListener, LookState, LookingStateDetector};
pub use object::{
    Arguments, Behavior, Material, Mesh, Node, ObjectId, PlainObject, RenderData, SceneObject,
    Transform, DEFAULT_OBJECT_TYPE,
};
pub use tree::SceneTree;

//=== SceneBehavior =======================================================

/// Per-type logic of a scene.
///
/// Scene types are registered with the `ObjectFactory`. Only `as_any` and
/// `as_any_mut` are required; lifecycle hooks default to doing nothing.
pub trait SceneBehavior: Send + 'static {
    /// Called when the scene becomes the active scene.
    fn on_resume(&mut self, _arguments: &Arguments) {}

    /// Called when another scene replaces this one.
    fn on_pause(&mut self) {}

    /// Called every frame before the object tree is updated. The tree is
    /// the scene's own, so look-at checks and edits can happen here.
    fn update(&mut self, _tree: &mut SceneTree, _frame: &Frame) {}

    /// First handler in the key chain. Return `true` to consume.
    fn on_key(&mut self, _event: &KeyEvent) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Behavior of the built-in default scene type.
#[derive(Debug, Default)]
pub struct BasicScene;

impl SceneBehavior for BasicScene {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

//=== Scene ===============================================================

/// Factory key of the built-in default scene type.
pub const DEFAULT_SCENE_TYPE: &str = "scene";

/// A scene shared between the render thread and controlling threads.
pub type SharedScene = Arc<Mutex<Scene>>;

/// Root of one object tree.
pub struct Scene {
    id: ObjectId,
    type_name: String,
    arguments: Arguments,
    active: bool,
    behavior: Box<dyn SceneBehavior>,
    tree: SceneTree,
}

impl Scene {
    pub fn new(type_name: impl Into<String>, behavior: Box<dyn SceneBehavior>) -> Self {
        Self {
            id: ObjectId::next(),
            type_name: type_name.into(),
            arguments: Arguments::new(),
            active: false,
            behavior,
            tree: SceneTree::new(),
        }
    }

    /// Scene of the default type with no behavior.
    pub fn basic() -> Self {
        Self::new(DEFAULT_SCENE_TYPE, Box::new(BasicScene))
    }

    /// Wraps the scene for handing to the lifecycle manager.
    pub fn into_shared(self) -> SharedScene {
        Arc::new(Mutex::new(self))
    }

    //--- Accessors --------------------------------------------------------

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn arguments_mut(&mut self) -> &mut Arguments {
        &mut self.arguments
    }

    pub fn set_arguments(&mut self, arguments: Arguments) {
        self.arguments = arguments;
    }

    pub fn behavior<T: SceneBehavior>(&self) -> Option<&T> {
        self.behavior.as_any().downcast_ref::<T>()
    }

    pub fn behavior_mut<T: SceneBehavior>(&mut self) -> Option<&mut T> {
        self.behavior.as_any_mut().downcast_mut::<T>()
    }

    //--- Tree -------------------------------------------------------------

    pub fn tree(&self) -> &SceneTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut SceneTree {
        &mut self.tree
    }

    pub fn children(&self) -> &[SceneObject] {
        self.tree.children()
    }

    pub fn children_mut(&mut self) -> &mut [SceneObject] {
        self.tree.children_mut()
    }

    pub fn add_child(&mut self, child: SceneObject) {
        self.tree.add_child(child);
    }

    pub fn remove_object(&mut self, id: ObjectId) -> Option<SceneObject> {
        self.tree.remove_object(id)
    }

    pub fn object_count(&self) -> usize {
        self.tree.object_count()
    }

    pub fn walk<F>(&self, visit: F)
    where
        F: FnMut(&SceneObject, usize),
    {
        self.tree.walk(visit);
    }

    pub fn find(&self, id: ObjectId) -> Option<&SceneObject> {
        self.tree.find(id)
    }

    pub fn find_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.tree.find_mut(id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&SceneObject> {
        self.tree.find_by_name(name)
    }

    pub fn world_matrix(&self, id: ObjectId) -> Option<Mat4> {
        self.tree.world_matrix(id)
    }

    pub fn is_looking_at(&self, id: ObjectId, frame: &Frame) -> bool {
        self.tree.is_looking_at(id, frame)
    }

    //--- Lifecycle --------------------------------------------------------

    pub(crate) fn resume(&mut self) {
        self.active = true;
        self.behavior.on_resume(&self.arguments);
    }

    pub(crate) fn pause(&mut self) {
        self.active = false;
        self.behavior.on_pause();
    }

    //--- Frame Hooks ------------------------------------------------------

    /// Advances the scene behavior, then every object depth-first.
    pub fn update(&mut self, frame: &Frame) {
        self.behavior.update(&mut self.tree, frame);
        self.tree.update(frame);
    }

    /// Runs the key handler chain: scene behavior, then visible objects
    /// depth-first. Returns `true` if any handler consumed the event.
    pub fn dispatch_key(&mut self, event: &KeyEvent) -> bool {
        if self.behavior.on_key(event) {
            return true;
        }
        self.tree.dispatch_key(event)
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("active", &self.active)
            .field("arguments", &self.arguments)
            .field("tree", &self.tree)
            .finish_non_exhaustive()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

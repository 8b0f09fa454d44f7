//=========================================================================
// Scene Objects
//=========================================================================
//
// One node of the renderable tree.
//
// Structure:
//   SceneObject
//     ├─ type_name      registered factory key that built it
//     ├─ node: Node     identity, visibility, transform, render data, args
//     ├─ behavior       polymorphic per-type logic (Box<dyn Behavior>)
//     └─ children       owned exclusively, ordered
//
// Objects are only ever appended to a parent; there is no re-parenting,
// so the tree cannot contain cycles.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Quat, Vec3};

//=== Internal Dependencies ===============================================

use crate::core::frame::Frame;
use crate::core::input::KeyEvent;
use crate::core::resource::ResourceBinding;

//=== ObjectId ============================================================

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a scene object or scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub(crate) fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

//=== Arguments ===========================================================

/// String key/value bag attached to scenes and objects.
///
/// Scenes receive their arguments on creation. Objects collect pass-through
/// (namespaced) markup attributes here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments(BTreeMap<String, String>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

//=== Transform ===========================================================

/// Local transform relative to the parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

//=== RenderData ==========================================================

/// Geometry source. Opaque to the framework beyond its size.
#[derive(Debug, Clone, PartialEq)]
pub enum Mesh {
    /// Flat quad of explicit size, centered on the object origin.
    Quad { width: f32, height: f32 },

    /// Host-provided geometry.
    Resource(ResourceBinding),
}

/// Surface source, e.g. a texture or an inflated external view.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub source: ResourceBinding,
}

/// Mesh + material pair consumed by the external render pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderData {
    pub mesh: Option<Mesh>,
    pub material: Option<Material>,
}

impl RenderData {
    pub fn is_empty(&self) -> bool {
        self.mesh.is_none() && self.material.is_none()
    }
}

//=== Node ================================================================

/// Per-object state shared by every object type.
///
/// Behaviors receive `&mut Node` so they can move, hide or re-skin the
/// object they belong to.
#[derive(Debug, Clone)]
pub struct Node {
    id: ObjectId,
    pub name: Option<String>,
    pub visible: bool,
    pub transform: Transform,
    pub render_data: RenderData,
    pub arguments: Arguments,
}

impl Node {
    fn new() -> Self {
        Self {
            id: ObjectId::next(),
            name: None,
            visible: true,
            transform: Transform::IDENTITY,
            render_data: RenderData::default(),
            arguments: Arguments::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Radius of a sphere around the origin enclosing the mesh, in local units.
    pub fn local_bounding_radius(&self) -> f32 {
        let size = match &self.render_data.mesh {
            Some(Mesh::Quad { width, height }) => Some(glam::Vec2::new(*width, *height)),
            Some(Mesh::Resource(binding)) => binding.size,
            None => None,
        };

        match size {
            Some(size) => size.length() * 0.5,
            None => 0.5,
        }
    }
}

//=== Behavior ============================================================

/// Per-type logic of a scene object.
///
/// Object types are registered with the `ObjectFactory` as constructors
/// returning a boxed behavior. All hooks have empty defaults.
pub trait Behavior: Send + 'static {
    /// Called once per frame while the owning scene is active.
    fn update(&mut self, _node: &mut Node, _frame: &Frame) {}

    /// Key handler. Return `true` to consume the event.
    fn on_key(&mut self, _node: &mut Node, _event: &KeyEvent) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Behavior of the built-in default object type.
#[derive(Debug, Default)]
pub struct PlainObject;

impl Behavior for PlainObject {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

//=== SceneObject =========================================================

/// Factory key of the built-in default object type.
pub const DEFAULT_OBJECT_TYPE: &str = "object";

/// A node of the scene tree together with its behavior and children.
pub struct SceneObject {
    type_name: String,
    node: Node,
    behavior: Box<dyn Behavior>,
    children: Vec<SceneObject>,
}

impl SceneObject {
    pub fn new(type_name: impl Into<String>, behavior: Box<dyn Behavior>) -> Self {
        Self {
            type_name: type_name.into(),
            node: Node::new(),
            behavior,
            children: Vec::new(),
        }
    }

    /// Object of the default type with no behavior.
    pub fn plain() -> Self {
        Self::new(DEFAULT_OBJECT_TYPE, Box::new(PlainObject))
    }

    //--- Accessors --------------------------------------------------------

    pub fn id(&self) -> ObjectId {
        self.node.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn name(&self) -> Option<&str> {
        self.node.name.as_deref()
    }

    pub fn is_visible(&self) -> bool {
        self.node.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.node.visible = visible;
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    pub fn render_data(&self) -> &RenderData {
        &self.node.render_data
    }

    pub fn arguments(&self) -> &Arguments {
        &self.node.arguments
    }

    /// Downcasts the behavior to its concrete type.
    pub fn behavior<T: Behavior>(&self) -> Option<&T> {
        self.behavior.as_any().downcast_ref::<T>()
    }

    pub fn behavior_mut<T: Behavior>(&mut self) -> Option<&mut T> {
        self.behavior.as_any_mut().downcast_mut::<T>()
    }

    //--- Children ---------------------------------------------------------

    pub fn children(&self) -> &[SceneObject] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [SceneObject] {
        &mut self.children
    }

    /// Appends `child`, taking ownership of it.
    pub fn add_child(&mut self, child: SceneObject) {
        self.children.push(child);
    }

    /// Detaches and returns the direct child with `id`.
    pub fn remove_child(&mut self, id: ObjectId) -> Option<SceneObject> {
        let pos = self.children.iter().position(|c| c.id() == id)?;
        Some(self.children.remove(pos))
    }

    /// Number of objects in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(SceneObject::subtree_len).sum::<usize>()
    }

    //--- Traversal --------------------------------------------------------

    /// Depth-first, pre-order visit of this subtree. `depth` of `self` is 0.
    pub fn walk<F>(&self, visit: &mut F)
    where
        F: FnMut(&SceneObject, usize),
    {
        self.walk_at(0, visit);
    }

    fn walk_at<F>(&self, depth: usize, visit: &mut F)
    where
        F: FnMut(&SceneObject, usize),
    {
        visit(self, depth);
        for child in &self.children {
            child.walk_at(depth + 1, visit);
        }
    }

    pub fn find(&self, id: ObjectId) -> Option<&SceneObject> {
        if self.id() == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    pub fn find_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        if self.id() == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&SceneObject> {
        if self.name() == Some(name) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_name(name))
    }

    /// World transform of `id` given this object's parent world transform.
    pub(crate) fn world_matrix_of(&self, id: ObjectId, parent: Mat4) -> Option<(&SceneObject, Mat4)> {
        let world = parent * self.node.transform.to_matrix();
        if self.id() == id {
            return Some((self, world));
        }
        self.children.iter().find_map(|c| c.world_matrix_of(id, world))
    }

    //--- Frame Hooks ------------------------------------------------------

    /// Updates this object, then its children in order.
    pub fn update(&mut self, frame: &Frame) {
        self.behavior.update(&mut self.node, frame);
        for child in &mut self.children {
            child.update(frame);
        }
    }

    /// Offers `event` to this object, then its children depth-first.
    /// Hidden subtrees are skipped. Stops at the first consumer.
    pub fn dispatch_key(&mut self, event: &KeyEvent) -> bool {
        if !self.node.visible {
            return false;
        }

        if self.behavior.on_key(&mut self.node, event) {
            return true;
        }

        self.children.iter_mut().any(|child| child.dispatch_key(event))
    }
}

impl std::fmt::Debug for SceneObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneObject")
            .field("type_name", &self.type_name)
            .field("node", &self.node)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

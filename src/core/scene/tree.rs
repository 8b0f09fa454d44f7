//=========================================================================
// Scene Tree
//=========================================================================
//
// The object tree under a scene root, kept apart from the scene's
// behavior so a behavior can query and edit the tree from its own
// per-frame hook.
//
//=========================================================================

//=== External Dependencies ===============================================

use glam::Mat4;

//=== Internal Dependencies ===============================================

use super::looking;
use super::{ObjectId, SceneObject};
use crate::core::frame::Frame;
use crate::core::input::KeyEvent;

//=== SceneTree ===========================================================

/// Top-level objects of a scene and everything below them.
#[derive(Debug, Default)]
pub struct SceneTree {
    children: Vec<SceneObject>,
}

impl SceneTree {
    pub fn new() -> Self {
        Self::default()
    }

    //--- Structure --------------------------------------------------------

    pub fn children(&self) -> &[SceneObject] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [SceneObject] {
        &mut self.children
    }

    pub fn add_child(&mut self, child: SceneObject) {
        self.children.push(child);
    }

    /// Detaches the object with `id` from wherever it sits in the tree.
    pub fn remove_object(&mut self, id: ObjectId) -> Option<SceneObject> {
        if let Some(pos) = self.children.iter().position(|c| c.id() == id) {
            return Some(self.children.remove(pos));
        }
        self.children.iter_mut().find_map(|c| remove_below(c, id))
    }

    /// Number of objects in the tree, not counting the scene itself.
    pub fn object_count(&self) -> usize {
        self.children.iter().map(SceneObject::subtree_len).sum()
    }

    //--- Queries ----------------------------------------------------------

    /// Depth-first, pre-order visit. Top-level objects have depth 0.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&SceneObject, usize),
    {
        for child in &self.children {
            child.walk(&mut visit);
        }
    }

    pub fn find(&self, id: ObjectId) -> Option<&SceneObject> {
        self.children.iter().find_map(|c| c.find(id))
    }

    pub fn find_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&SceneObject> {
        self.children.iter().find_map(|c| c.find_by_name(name))
    }

    /// World transform of the object with `id`.
    pub fn world_matrix(&self, id: ObjectId) -> Option<Mat4> {
        self.locate(id).map(|(_, world)| world)
    }

    /// Returns `true` if the viewer's gaze ray hits the object's bounds.
    ///
    /// Hidden or unknown objects are never looked at.
    pub fn is_looking_at(&self, id: ObjectId, frame: &Frame) -> bool {
        let Some((object, world)) = self.locate(id) else {
            return false;
        };

        if !object.is_visible() {
            return false;
        }

        let (scale, _, center) = world.to_scale_rotation_translation();
        let radius = object.node().local_bounding_radius() * scale.abs().max_element();
        let pose = frame.pose();

        looking::ray_hits_sphere(pose.position, pose.forward(), center, radius)
    }

    fn locate(&self, id: ObjectId) -> Option<(&SceneObject, Mat4)> {
        self.children
            .iter()
            .find_map(|c| c.world_matrix_of(id, Mat4::IDENTITY))
    }

    //--- Frame Hooks ------------------------------------------------------

    pub(super) fn update(&mut self, frame: &Frame) {
        for child in &mut self.children {
            child.update(frame);
        }
    }

    pub(super) fn dispatch_key(&mut self, event: &KeyEvent) -> bool {
        self.children.iter_mut().any(|child| child.dispatch_key(event))
    }
}

fn remove_below(parent: &mut SceneObject, id: ObjectId) -> Option<SceneObject> {
    if let Some(found) = parent.remove_child(id) {
        return Some(found);
    }
    parent.children_mut().iter_mut().find_map(|c| remove_below(c, id))
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn world_matrix_composes_parent_transforms() {
        let mut tree = SceneTree::new();
        let mut parent = SceneObject::plain();
        parent.node_mut().transform.position = Vec3::new(1.0, 0.0, 0.0);
        let mut child = SceneObject::plain();
        child.node_mut().transform.position = Vec3::new(0.0, 2.0, 0.0);
        let child_id = child.id();
        parent.add_child(child);
        tree.add_child(parent);

        let origin = tree.world_matrix(child_id).unwrap().transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
        assert!(tree.world_matrix(ObjectId::next()).is_none());
    }

    #[test]
    fn find_by_name_searches_nested_objects() {
        let mut tree = SceneTree::new();
        let mut group = SceneObject::plain();
        let mut named = SceneObject::plain();
        named.node_mut().name = Some("cursor".into());
        let named_id = named.id();
        group.add_child(named);
        tree.add_child(group);

        assert_eq!(tree.find_by_name("cursor").map(SceneObject::id), Some(named_id));
        assert!(tree.find_by_name("missing").is_none());
    }
}

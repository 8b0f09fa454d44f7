//=========================================================================
// Object Factory
//=========================================================================
//
// Maps type names used in markup to constructors of object and scene
// behaviors. Registration happens at startup; lookup fails closed.
//
// Name resolution:
//   1. exact registered key            ("Cube")
//   2. final path segment of the name  ("com.example.Cube", "demo::Cube")
//   3. otherwise TypeResolutionError::Unknown
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

//=== Internal Dependencies ===============================================

use super::{ConstructError, TypeResolutionError};
use crate::core::scene::{
    BasicScene, Behavior, PlainObject, Scene, SceneBehavior, SceneObject, DEFAULT_OBJECT_TYPE,
    DEFAULT_SCENE_TYPE,
};

//=== Constructor Types ===================================================

type ObjectCtor = Arc<dyn Fn() -> Result<Box<dyn Behavior>, ConstructError> + Send + Sync>;
type SceneCtor = Arc<dyn Fn() -> Result<Box<dyn SceneBehavior>, ConstructError> + Send + Sync>;

//=== ObjectFactory =======================================================

/// Registry of constructible object and scene types.
///
/// A new factory already knows the default types `"object"` and `"scene"`.
#[derive(Clone)]
pub struct ObjectFactory {
    objects: HashMap<String, ObjectCtor>,
    scenes: HashMap<String, SceneCtor>,
}

impl ObjectFactory {
    pub fn new() -> Self {
        let mut factory = Self {
            objects: HashMap::new(),
            scenes: HashMap::new(),
        };
        factory.register_object(DEFAULT_OBJECT_TYPE, || PlainObject);
        factory.register_scene(DEFAULT_SCENE_TYPE, || BasicScene);
        factory
    }

    //--- Registration -----------------------------------------------------

    /// Registers an object type whose constructor cannot fail.
    pub fn register_object<F, B>(&mut self, name: &str, ctor: F)
    where
        F: Fn() -> B + Send + Sync + 'static,
        B: Behavior,
    {
        self.insert_object(name, Arc::new(move || Ok(Box::new(ctor()) as Box<dyn Behavior>)));
    }

    /// Registers an object type whose constructor may fail.
    pub fn register_object_with<F, B, E>(&mut self, name: &str, ctor: F)
    where
        F: Fn() -> Result<B, E> + Send + Sync + 'static,
        B: Behavior,
        E: Into<ConstructError>,
    {
        self.insert_object(
            name,
            Arc::new(move || match ctor() {
                Ok(behavior) => Ok(Box::new(behavior) as Box<dyn Behavior>),
                Err(e) => Err(e.into()),
            }),
        );
    }

    /// Registers a scene type whose constructor cannot fail.
    pub fn register_scene<F, B>(&mut self, name: &str, ctor: F)
    where
        F: Fn() -> B + Send + Sync + 'static,
        B: SceneBehavior,
    {
        self.insert_scene(name, Arc::new(move || Ok(Box::new(ctor()) as Box<dyn SceneBehavior>)));
    }

    /// Registers a scene type whose constructor may fail.
    pub fn register_scene_with<F, B, E>(&mut self, name: &str, ctor: F)
    where
        F: Fn() -> Result<B, E> + Send + Sync + 'static,
        B: SceneBehavior,
        E: Into<ConstructError>,
    {
        self.insert_scene(
            name,
            Arc::new(move || match ctor() {
                Ok(behavior) => Ok(Box::new(behavior) as Box<dyn SceneBehavior>),
                Err(e) => Err(e.into()),
            }),
        );
    }

    fn insert_object(&mut self, name: &str, ctor: ObjectCtor) {
        if self.objects.insert(name.to_owned(), ctor).is_some() {
            warn!(target: "markup", "Object type `{}` re-registered, previous constructor replaced", name);
        } else {
            debug!(target: "markup", "Registered object type `{}`", name);
        }
    }

    fn insert_scene(&mut self, name: &str, ctor: SceneCtor) {
        if self.scenes.insert(name.to_owned(), ctor).is_some() {
            warn!(target: "markup", "Scene type `{}` re-registered, previous constructor replaced", name);
        } else {
            debug!(target: "markup", "Registered scene type `{}`", name);
        }
    }

    //--- Queries ----------------------------------------------------------

    pub fn has_object_type(&self, name: &str) -> bool {
        lookup(&self.objects, name).is_some()
    }

    pub fn has_scene_type(&self, name: &str) -> bool {
        lookup(&self.scenes, name).is_some()
    }

    //--- Construction -----------------------------------------------------

    /// Instantiates the object type `type_name`, or the default type for `None`.
    pub fn create_object(&self, type_name: Option<&str>) -> Result<SceneObject, TypeResolutionError> {
        let requested = type_name.unwrap_or(DEFAULT_OBJECT_TYPE);

        let Some((key, ctor)) = lookup(&self.objects, requested) else {
            return Err(self.unresolved(requested, "object"));
        };

        let behavior = ctor().map_err(|source| TypeResolutionError::Construction {
            type_name: key.to_owned(),
            source,
        })?;

        Ok(SceneObject::new(key, behavior))
    }

    /// Instantiates the scene type `type_name`, or the default type for `None`.
    pub fn create_scene(&self, type_name: Option<&str>) -> Result<Scene, TypeResolutionError> {
        let requested = type_name.unwrap_or(DEFAULT_SCENE_TYPE);

        let Some((key, ctor)) = lookup(&self.scenes, requested) else {
            return Err(self.unresolved(requested, "scene"));
        };

        let behavior = ctor().map_err(|source| TypeResolutionError::Construction {
            type_name: key.to_owned(),
            source,
        })?;

        Ok(Scene::new(key, behavior))
    }

    fn unresolved(&self, requested: &str, expected: &'static str) -> TypeResolutionError {
        let other_kind = match expected {
            "scene" => lookup(&self.objects, requested).map(|_| "object"),
            _ => lookup(&self.scenes, requested).map(|_| "scene"),
        };

        match other_kind {
            Some(found) => TypeResolutionError::WrongKind {
                type_name: requested.to_owned(),
                expected,
                found,
            },
            None => TypeResolutionError::Unknown {
                type_name: requested.to_owned(),
                expected,
            },
        }
    }
}

impl Default for ObjectFactory {
    fn default() -> Self {
        Self::new()
    }
}

//=== Name Lookup =========================================================

fn lookup<'a, T>(map: &'a HashMap<String, T>, name: &str) -> Option<(&'a str, &'a T)> {
    if let Some((key, value)) = map.get_key_value(name) {
        return Some((key.as_str(), value));
    }

    let short = short_name(name)?;
    map.get_key_value(short).map(|(key, value)| (key.as_str(), value))
}

/// Final segment of a qualified name, or `None` if unqualified.
fn short_name(name: &str) -> Option<&str> {
    let by_path = name.rsplit_once("::").map(|(_, tail)| tail);
    let by_dot = name.rsplit_once('.').map(|(_, tail)| tail);

    match (by_path, by_dot) {
        (Some(a), Some(b)) => Some(if a.len() < b.len() { a } else { b }),
        (a, b) => a.or(b),
    }
    .filter(|tail| !tail.is_empty())
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::error::Error;

    #[derive(Default)]
    struct Cube;

    impl Behavior for Cube {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("no GPU context")]
    struct NoContext;

    #[test]
    fn default_types_without_name() {
        let factory = ObjectFactory::new();

        let object = factory.create_object(None).unwrap();
        assert_eq!(object.type_name(), DEFAULT_OBJECT_TYPE);
        assert!(object.behavior::<PlainObject>().is_some());

        let scene = factory.create_scene(None).unwrap();
        assert_eq!(scene.type_name(), DEFAULT_SCENE_TYPE);
    }

    #[test]
    fn registered_type_is_constructed() {
        let mut factory = ObjectFactory::new();
        factory.register_object("Cube", Cube::default);

        let object = factory.create_object(Some("Cube")).unwrap();
        assert_eq!(object.type_name(), "Cube");
        assert!(object.behavior::<Cube>().is_some());
    }

    #[test]
    fn qualified_names_resolve_to_short_key() {
        let mut factory = ObjectFactory::new();
        factory.register_object("Cube", Cube::default);

        for name in ["com.example.Cube", "demo::shapes::Cube"] {
            let object = factory.create_object(Some(name)).unwrap();
            assert_eq!(object.type_name(), "Cube", "{name} should resolve");
        }
    }

    #[test]
    fn unknown_type_fails_closed() {
        let factory = ObjectFactory::new();
        match factory.create_object(Some("Teapot")) {
            Err(TypeResolutionError::Unknown { type_name, expected }) => {
                assert_eq!(type_name, "Teapot");
                assert_eq!(expected, "object");
            }
            other => panic!("Expected Unknown, got {:?}", other.map(|o| o.type_name().to_owned())),
        }
    }

    #[test]
    fn object_type_used_as_scene_is_wrong_kind() {
        let mut factory = ObjectFactory::new();
        factory.register_object("Cube", Cube::default);

        assert!(matches!(
            factory.create_scene(Some("Cube")),
            Err(TypeResolutionError::WrongKind { found: "object", .. })
        ));
    }

    #[test]
    fn constructor_failure_keeps_cause() {
        let mut factory = ObjectFactory::new();
        factory.register_object_with("Video", || Err::<Cube, _>(NoContext));

        let err = factory.create_object(Some("Video")).unwrap_err();
        assert!(matches!(err, TypeResolutionError::Construction { .. }));
        let cause = err.source().expect("cause retained");
        assert_eq!(cause.to_string(), "no GPU context");
    }

    #[test]
    fn later_registration_overrides() {
        #[derive(Default)]
        struct Sphere;
        impl Behavior for Sphere {
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        let mut factory = ObjectFactory::new();
        factory.register_object("shape", Cube::default);
        factory.register_object("shape", Sphere::default);

        let object = factory.create_object(Some("shape")).unwrap();
        assert!(object.behavior::<Sphere>().is_some());
    }

    #[test]
    fn short_name_picks_last_segment() {
        assert_eq!(short_name("a.b.C"), Some("C"));
        assert_eq!(short_name("a::b::C"), Some("C"));
        assert_eq!(short_name("C"), None);
        assert_eq!(short_name("trailing."), None);
    }
}

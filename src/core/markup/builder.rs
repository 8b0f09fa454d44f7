//=========================================================================
// Scene Builder
//=========================================================================
//
// Streams an XML document and produces a populated Scene.
//
// Flow:
//   skip to first element ─┬─ EOF → existing scene, or a default one
//                          ├─ existing scene → element is a wrapper
//                          ├─ <scene class=T> → scene of type T
//                          └─ <T>            → scene of type T
//   every later element   → ObjectFactory::create_object(class)
//                          → attributes dispatched / passed through
//                          → appended to nearest open element or scene
//   end element           → closes one nesting level
//
// Any failure aborts the build; nothing partial is returned.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

//=== Internal Dependencies ===============================================

use super::attributes::{AttributeContext, AttributeRegistry, ElementAttributes};
use super::factory::ObjectFactory;
use super::BuildError;
use crate::core::reclaim::NativeRegistry;
use crate::core::resource::ResourceResolver;
use crate::core::scene::{Scene, SceneObject, DEFAULT_SCENE_TYPE};

//=== Constants ===========================================================

/// Attribute naming the type of the element's object or scene.
pub const CLASS_ATTRIBUTE: &str = "class";

/// Prefix of namespace declarations, which are never applied.
const XMLNS: &str = "xmlns";

//=== SceneBuilder ========================================================

/// Builds scenes from markup using shared, read-only registries.
#[derive(Clone)]
pub struct SceneBuilder {
    factory: Arc<ObjectFactory>,
    attributes: Arc<AttributeRegistry>,
    resources: Arc<dyn ResourceResolver>,
    natives: NativeRegistry,
}

impl SceneBuilder {
    pub fn new(
        factory: Arc<ObjectFactory>,
        attributes: Arc<AttributeRegistry>,
        resources: Arc<dyn ResourceResolver>,
        natives: NativeRegistry,
    ) -> Self {
        Self {
            factory,
            attributes,
            resources,
            natives,
        }
    }

    pub fn build_str(&self, markup: &str, existing: Option<Scene>) -> Result<Scene, BuildError> {
        self.build(markup.as_bytes(), existing)
    }

    pub fn build_file(&self, path: impl AsRef<Path>, existing: Option<Scene>) -> Result<Scene, BuildError> {
        let file = File::open(path.as_ref())?;
        self.build(file, existing)
    }

    /// Builds a scene from `input`.
    ///
    /// With `existing`, objects are appended to that scene and the root
    /// element only acts as a wrapper. Without it, the root element names
    /// the scene type and its remaining attributes become scene arguments.
    pub fn build<R: Read>(&self, input: R, existing: Option<Scene>) -> Result<Scene, BuildError> {
        let mut reader = Reader::from_reader(BufReader::new(input));
        let mut buf = Vec::new();

        //--- Root element --------------------------------------------------

        let (root, root_open) = loop {
            let position = reader.buffer_position() as u64;
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => break (read_element(&e, position)?, true),
                Ok(Event::Empty(e)) => break (read_element(&e, position)?, false),
                Ok(Event::Eof) => {
                    debug!(target: "markup", "Empty document");
                    return match existing {
                        Some(scene) => Ok(scene),
                        None => Ok(self.factory.create_scene(None)?),
                    };
                }
                Ok(_) => {}
                Err(source) => return Err(BuildError::Markup { position, source }),
            }
            buf.clear();
        };
        buf.clear();

        let mut scene = match existing {
            Some(scene) => scene,
            None => self.create_scene(&root)?,
        };

        //--- Object tree ---------------------------------------------------

        let mut open_tags: Vec<String> = Vec::new();
        if root_open {
            open_tags.push(root.tag().to_owned());
        }
        let mut stack: Vec<SceneObject> = Vec::new();

        loop {
            let position = reader.buffer_position() as u64;
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let element = read_element(&e, position)?;
                    stack.push(self.create_object(&element)?);
                    open_tags.push(element.tag().to_owned());
                }
                Ok(Event::Empty(e)) => {
                    let element = read_element(&e, position)?;
                    let object = self.create_object(&element)?;
                    attach(&mut scene, &mut stack, object);
                }
                Ok(Event::End(_)) => {
                    // The root wrapper has no object on the stack.
                    let closes_object = open_tags.len() > usize::from(root_open);
                    open_tags.pop();
                    if closes_object {
                        if let Some(object) = stack.pop() {
                            attach(&mut scene, &mut stack, object);
                        }
                    }
                }
                Ok(Event::Eof) => {
                    if let Some(element) = open_tags.pop() {
                        return Err(BuildError::Unclosed { position, element });
                    }
                    break;
                }
                Ok(_) => {}
                Err(source) => return Err(BuildError::Markup { position, source }),
            }
            buf.clear();
        }

        info!(
            target: "markup",
            "Built scene `{}` with {} object(s)",
            scene.type_name(),
            scene.object_count()
        );
        Ok(scene)
    }

    //--- Element Construction ---------------------------------------------

    fn create_scene(&self, root: &ElementAttributes) -> Result<Scene, BuildError> {
        let type_name = if root.tag() == DEFAULT_SCENE_TYPE {
            root.get(CLASS_ATTRIBUTE)
        } else {
            Some(root.tag())
        };

        let mut scene = self.factory.create_scene(type_name)?;
        for (key, value) in root.iter() {
            if key == CLASS_ATTRIBUTE || is_namespace_declaration(key) {
                continue;
            }
            scene.arguments_mut().insert(key, value);
        }

        debug!(target: "markup", "Root <{}> created scene `{}`", root.tag(), scene.type_name());
        Ok(scene)
    }

    fn create_object(&self, element: &ElementAttributes) -> Result<SceneObject, BuildError> {
        let mut object = self.factory.create_object(element.get(CLASS_ATTRIBUTE))?;

        let ctx = AttributeContext {
            element,
            resources: self.resources.as_ref(),
            natives: &self.natives,
        };

        for (key, value) in element.iter() {
            if key == CLASS_ATTRIBUTE || is_namespace_declaration(key) {
                continue;
            }
            if key.contains(':') {
                object.node_mut().arguments.insert(key, value);
                continue;
            }
            self.attributes.dispatch(&mut object, key, value, &ctx)?;
        }

        Ok(object)
    }
}

//=== Helpers =============================================================

fn attach(scene: &mut Scene, stack: &mut [SceneObject], object: SceneObject) {
    match stack.last_mut() {
        Some(parent) => parent.add_child(object),
        None => scene.add_child(object),
    }
}

fn is_namespace_declaration(key: &str) -> bool {
    key == XMLNS || key.starts_with("xmlns:")
}

fn read_element(start: &BytesStart<'_>, position: u64) -> Result<ElementAttributes, BuildError> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = ElementAttributes::new(tag);

    for attr in start.attributes() {
        let attr = attr.map_err(|e| BuildError::Markup {
            position,
            source: e.into(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|source| BuildError::Markup { position, source })?;
        element.push(key, value.into_owned());
    }

    Ok(element)
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::markup::TypeResolutionError;
    use crate::core::reclaim::{NativeKind, Reclaimer};
    use crate::core::resource::{
        NullResolver, ResolvedResource, ResourceRef, ResourceResolutionError,
    };
    use crate::core::scene::{Behavior, Mesh, SceneBehavior};
    use std::any::Any;

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

    #[derive(Default)]
    struct Lobby;

    impl SceneBehavior for Lobby {
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct LayoutResolver;

    impl ResourceResolver for LayoutResolver {
        fn resolve(&self, reference: &ResourceRef) -> Result<ResolvedResource, ResourceResolutionError> {
            if reference.kind == "layout" {
                Ok(ResolvedResource::new(reference.clone())
                    .with_native(NativeKind::Texture, 42)
                    .with_size(1.6, 0.9))
            } else {
                Err(ResourceResolutionError::NotFound(reference.clone()))
            }
        }
    }

    fn builder_with(resources: Arc<dyn ResourceResolver>) -> (SceneBuilder, Reclaimer) {
        let mut factory = ObjectFactory::new();
        factory.register_object("Cube", Cube::default);
        factory.register_scene("Lobby", Lobby::default);

        let reclaimer = Reclaimer::default();
        let builder = SceneBuilder::new(
            Arc::new(factory),
            Arc::new(AttributeRegistry::with_defaults()),
            resources,
            reclaimer.registry(),
        );
        (builder, reclaimer)
    }

    fn builder() -> (SceneBuilder, Reclaimer) {
        builder_with(Arc::new(NullResolver))
    }

    //=== Structure ========================================================

    #[test]
    fn nested_elements_produce_matching_tree() {
        let (builder, _reclaimer) = builder();
        let markup = r#"<?xml version="1.0"?>
            <!-- lobby -->
            <scene>
                <object name="group">
                    <object/>
                    <object class="Cube"/>
                </object>
                <object/>
            </scene>
        "#;

        let scene = builder.build_str(markup, None).unwrap();

        assert_eq!(scene.type_name(), DEFAULT_SCENE_TYPE);
        assert_eq!(scene.object_count(), 4);
        let group = scene.find_by_name("group").unwrap();
        assert_eq!(group.children().len(), 2);
        assert_eq!(group.children()[1].type_name(), "Cube");
    }

    #[test]
    fn scene_class_attribute_picks_type() {
        let (builder, _reclaimer) = builder();
        let scene = builder
            .build_str(r#"<scene class="Lobby" level="3"><object/></scene>"#, None)
            .unwrap();

        assert_eq!(scene.type_name(), "Lobby");
        assert!(scene.behavior::<Lobby>().is_some());
        assert_eq!(scene.arguments().get("level"), Some("3"));
        assert!(!scene.arguments().contains_key(CLASS_ATTRIBUTE));
    }

    #[test]
    fn root_tag_names_scene_type() {
        let (builder, _reclaimer) = builder();
        let scene = builder.build_str("<Lobby><object/></Lobby>", None).unwrap();

        assert_eq!(scene.type_name(), "Lobby");
        assert_eq!(scene.object_count(), 1);
    }

    #[test]
    fn existing_scene_receives_objects() {
        let (builder, _reclaimer) = builder();
        let mut existing = Scene::basic();
        existing.add_child(SceneObject::plain());
        let id = existing.id();

        let scene = builder
            .build_str(r#"<anything class="Lobby"><object/><object/></anything>"#, Some(existing))
            .unwrap();

        assert_eq!(scene.id(), id);
        assert_eq!(scene.type_name(), DEFAULT_SCENE_TYPE);
        assert_eq!(scene.object_count(), 3);
    }

    #[test]
    fn empty_document_returns_existing_or_default() {
        let (builder, _reclaimer) = builder();

        let existing = Scene::basic();
        let id = existing.id();
        assert_eq!(builder.build_str("  <!-- nothing -->  ", Some(existing)).unwrap().id(), id);

        let fresh = builder.build_str("", None).unwrap();
        assert_eq!(fresh.object_count(), 0);
        assert_eq!(fresh.type_name(), DEFAULT_SCENE_TYPE);
    }

    #[test]
    fn self_closing_root_builds_empty_scene() {
        let (builder, _reclaimer) = builder();
        let scene = builder.build_str(r#"<scene class="Lobby"/>"#, None).unwrap();
        assert_eq!(scene.type_name(), "Lobby");
        assert_eq!(scene.object_count(), 0);
    }

    //=== Attributes =======================================================

    #[test]
    fn layout_texture_end_to_end() {
        let (builder, reclaimer) = builder_with(Arc::new(LayoutResolver));
        let scene = builder
            .build_str(r#"<scene><object class="Cube" texture="@layout/test"/></scene>"#, None)
            .unwrap();

        let cube = &scene.children()[0];
        assert_eq!(cube.type_name(), "Cube");
        let render = cube.render_data();
        assert!(render.material.is_some());
        assert_eq!(render.mesh, Some(Mesh::Quad { width: 1.6, height: 0.9 }));
        assert_eq!(reclaimer.registry().tracked_count(), 1);
    }

    #[test]
    fn namespaced_attributes_pass_through() {
        let (builder, _reclaimer) = builder();
        let markup = r#"
            <scene xmlns:app="urn:app">
                <object app:speed="2.5" unknownKey="x" xmlns:ui="urn:ui"/>
            </scene>
        "#;

        let scene = builder.build_str(markup, None).unwrap();
        let object = &scene.children()[0];

        assert_eq!(object.arguments().get("app:speed"), Some("2.5"));
        assert!(!object.arguments().contains_key("unknownKey"));
        assert!(!object.arguments().contains_key("xmlns:ui"));
        assert!(!scene.arguments().contains_key("xmlns:app"));
    }

    #[test]
    fn unresolved_texture_keeps_building() {
        let (builder, _reclaimer) = builder();
        let scene = builder
            .build_str(r#"<scene><object texture="@layout/missing"/><object/></scene>"#, None)
            .unwrap();

        assert_eq!(scene.object_count(), 2);
        assert!(scene.children()[0].render_data().is_empty());
    }

    #[test]
    fn entities_in_values_are_unescaped() {
        let (builder, _reclaimer) = builder();
        let scene = builder
            .build_str(r#"<scene><object name="a &amp; b"/></scene>"#, None)
            .unwrap();
        assert!(scene.find_by_name("a & b").is_some());
    }

    //=== Failures =========================================================

    #[test]
    fn unknown_type_aborts_build() {
        let (builder, _reclaimer) = builder();
        let result = builder.build_str(r#"<scene><object/><object class="Teapot"/></scene>"#, None);

        assert!(matches!(
            result,
            Err(BuildError::TypeResolution(TypeResolutionError::Unknown { .. }))
        ));
    }

    #[test]
    fn unknown_scene_tag_aborts_build() {
        let (builder, _reclaimer) = builder();
        assert!(matches!(
            builder.build_str("<Nowhere/>", None),
            Err(BuildError::TypeResolution(_))
        ));
    }

    #[test]
    fn mandatory_attribute_failure_aborts_build() {
        let (builder, _reclaimer) = builder();
        let result = builder.build_str(r#"<scene><object mesh="@model/missing"/></scene>"#, None);

        assert!(matches!(
            result,
            Err(BuildError::TypeResolution(TypeResolutionError::Attribute { .. }))
        ));
    }

    #[test]
    fn mismatched_end_tag_reports_position() {
        let (builder, _reclaimer) = builder();
        match builder.build_str("<scene><object></scene>", None) {
            Err(BuildError::Markup { position, .. }) => assert!(position > 0),
            other => panic!("Expected markup error, got {:?}", other),
        }
    }

    #[test]
    fn unclosed_element_is_an_error() {
        let (builder, _reclaimer) = builder();
        match builder.build_str("<scene><object>", None) {
            Err(BuildError::Unclosed { element, .. }) => assert_eq!(element, "object"),
            other => panic!("Expected unclosed error, got {:?}", other),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let (builder, _reclaimer) = builder();
        let path = std::env::temp_dir().join("visor-engine-no-such-scene.xml");

        match builder.build_file(&path, None) {
            Err(BuildError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("Expected io error, got {:?}", other),
        }
    }

    #[test]
    fn build_file_reads_markup_from_disk() {
        let (builder, _reclaimer) = builder();
        let file_name = format!("visor-engine-scene-{}.xml", std::process::id());
        let path = std::env::temp_dir().join(file_name);
        std::fs::write(&path, r#"<scene><object name="panel"/></scene>"#).unwrap();

        let result = builder.build_file(&path, None);
        std::fs::remove_file(&path).unwrap();

        let scene = result.unwrap();
        assert!(scene.find_by_name("panel").is_some());
    }
}

//=========================================================================
// Attribute Handlers
//=========================================================================
//
// Maps markup attribute keys to code that applies them to a freshly
// constructed SceneObject.
//
// Dispatch outcome:
//   no handler for key          → Dispatch::Ignored   (forward compatible)
//   handler Ok                  → Dispatch::Applied
//   handler Err, not mandatory  → Dispatch::Skipped   (object unchanged, warn)
//   handler Err, mandatory      → TypeResolutionError::Attribute (build aborts)
//
// Built-in keys (AttributeRegistry::with_defaults):
//   name, id          object name
//   visible           "true" | "false"
//   position          "x y z" or "x,y,z"
//   scale             "s" or "x y z"
//   rotation          Euler degrees "pitch yaw roll"
//   width, height     quad mesh size; a missing side copies the other
//   texture, layout   material from a resource; sizes the quad when the
//                     element has no width, height or mesh
//   mesh              mesh from a resource reference (mandatory)
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;
use std::sync::Arc;

use glam::{EulerRot, Quat, Vec3};
use log::{trace, warn};
use thiserror::Error;

//=== Internal Dependencies ===============================================

use super::TypeResolutionError;
use crate::core::reclaim::NativeRegistry;
use crate::core::resource::{
    ResourceBinding, ResourceRef, ResourceResolutionError, ResourceResolver,
};
use crate::core::scene::{Material, Mesh, SceneObject};

//=== ElementAttributes ===================================================

/// Attributes of one markup element, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementAttributes {
    tag: String,
    pairs: Vec<(String, String)>,
}

impl ElementAttributes {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            pairs: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

//=== AttributeContext ====================================================

/// What a handler may consult besides the raw value.
pub struct AttributeContext<'a> {
    /// Every attribute on the element being built.
    pub element: &'a ElementAttributes,
    pub resources: &'a dyn ResourceResolver,
    pub natives: &'a NativeRegistry,
}

impl AttributeContext<'_> {
    /// Resolves `value` as a resource reference and tracks its native handle.
    ///
    /// A value without the `@kind/` prefix is looked up as an `asset`.
    pub fn resolve(&self, value: &str) -> Result<ResourceBinding, ResourceResolutionError> {
        let reference = if ResourceRef::is_reference(value) {
            ResourceRef::parse(value)
                .ok_or_else(|| ResourceResolutionError::Malformed(value.to_owned()))?
        } else {
            ResourceRef::new("asset", value)
        };

        let resolved = self.resources.resolve(&reference)?;
        Ok(resolved.bind(self.natives))
    }
}

//=== AttributeError ======================================================

#[derive(Debug, Error)]
pub enum AttributeError {
    #[error("invalid value `{value}`: {reason}")]
    InvalidValue { value: String, reason: &'static str },

    #[error(transparent)]
    Resource(#[from] ResourceResolutionError),

    /// Failure of an attribute the object cannot exist without.
    #[error("mandatory attribute failed")]
    Mandatory(#[source] Box<AttributeError>),
}

impl AttributeError {
    pub fn invalid(value: &str, reason: &'static str) -> Self {
        Self::InvalidValue {
            value: value.to_owned(),
            reason,
        }
    }

    /// Wraps `self` so it aborts the build instead of being skipped.
    pub fn mandatory(self) -> Self {
        match self {
            Self::Mandatory(_) => self,
            other => Self::Mandatory(Box::new(other)),
        }
    }

    pub fn is_mandatory(&self) -> bool {
        matches!(self, Self::Mandatory(_))
    }
}

//=== AttributeHandler ====================================================

/// Applies one attribute value to an object.
///
/// A handler that fails must leave the object as it found it.
pub trait AttributeHandler: Send + Sync {
    fn apply(
        &self,
        object: &mut SceneObject,
        value: &str,
        ctx: &AttributeContext<'_>,
    ) -> Result<(), AttributeError>;
}

struct FnHandler<F>(F);

impl<F> AttributeHandler for FnHandler<F>
where
    F: Fn(&mut SceneObject, &str, &AttributeContext<'_>) -> Result<(), AttributeError> + Send + Sync,
{
    fn apply(
        &self,
        object: &mut SceneObject,
        value: &str,
        ctx: &AttributeContext<'_>,
    ) -> Result<(), AttributeError> {
        (self.0)(object, value, ctx)
    }
}

//=== Dispatch ============================================================

/// Outcome of a non-fatal dispatch.
#[derive(Debug)]
pub enum Dispatch {
    Applied,
    Ignored,
    Skipped(AttributeError),
}

//=== AttributeRegistry ===================================================

/// Key → handler table. Built at startup, shared read-only afterwards.
#[derive(Clone, Default)]
pub struct AttributeRegistry {
    handlers: HashMap<String, Arc<dyn AttributeHandler>>,
}

impl AttributeRegistry {
    /// Registry without any handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handlers installed.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        let name: Arc<dyn AttributeHandler> = Arc::new(NameHandler);
        registry.register_shared("name", Arc::clone(&name));
        registry.register_shared("id", name);

        registry.register("visible", VisibleHandler);
        registry.register("position", PositionHandler);
        registry.register("scale", ScaleHandler);
        registry.register("rotation", RotationHandler);

        registry.register_shared("width", Arc::new(SizeHandler { side: Side::Width }));
        registry.register_shared("height", Arc::new(SizeHandler { side: Side::Height }));

        let surface: Arc<dyn AttributeHandler> = Arc::new(SurfaceHandler);
        registry.register_shared("texture", Arc::clone(&surface));
        registry.register_shared("layout", surface);

        registry.register("mesh", MeshHandler);
        registry
    }

    //--- Registration -----------------------------------------------------

    /// Installs `handler` for `key`, replacing any previous handler.
    pub fn register<H: AttributeHandler + 'static>(&mut self, key: &str, handler: H) {
        self.register_shared(key, Arc::new(handler));
    }

    pub fn register_shared(&mut self, key: &str, handler: Arc<dyn AttributeHandler>) {
        if self.handlers.insert(key.to_owned(), handler).is_some() {
            trace!(target: "markup", "Attribute handler for `{}` replaced", key);
        }
    }

    /// Installs a closure as the handler for `key`.
    pub fn register_fn<F>(&mut self, key: &str, handler: F)
    where
        F: Fn(&mut SceneObject, &str, &AttributeContext<'_>) -> Result<(), AttributeError>
            + Send
            + Sync
            + 'static,
    {
        self.register(key, FnHandler(handler));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    //--- Dispatch ---------------------------------------------------------

    /// Applies `key = value` to `object`.
    ///
    /// Only failures of mandatory attributes are returned as errors.
    pub fn dispatch(
        &self,
        object: &mut SceneObject,
        key: &str,
        value: &str,
        ctx: &AttributeContext<'_>,
    ) -> Result<Dispatch, TypeResolutionError> {
        let Some(handler) = self.handlers.get(key) else {
            trace!(target: "markup", "No handler for attribute `{}`, ignored", key);
            return Ok(Dispatch::Ignored);
        };

        match handler.apply(object, value, ctx) {
            Ok(()) => Ok(Dispatch::Applied),
            Err(e) if e.is_mandatory() => Err(TypeResolutionError::Attribute {
                type_name: object.type_name().to_owned(),
                attribute: key.to_owned(),
                source: e,
            }),
            Err(e) => {
                warn!(
                    target: "markup",
                    "Skipping attribute `{}=\"{}\"` on <{}>: {}",
                    key,
                    value,
                    ctx.element.tag(),
                    e
                );
                Ok(Dispatch::Skipped(e))
            }
        }
    }
}

//=== Value Parsing =======================================================

fn parse_f32(value: &str) -> Result<f32, AttributeError> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AttributeError::invalid(value, "expected a number"))
}

fn parse_components(value: &str) -> Result<Vec<f32>, AttributeError> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(parse_f32)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| AttributeError::invalid(value, "expected numeric components"))
}

fn parse_vec3(value: &str) -> Result<Vec3, AttributeError> {
    match parse_components(value)?.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(AttributeError::invalid(value, "expected three components")),
    }
}

fn parse_bool(value: &str) -> Result<bool, AttributeError> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(AttributeError::invalid(value, "expected `true` or `false`")),
    }
}

//=== Built-in Handlers ===================================================

struct NameHandler;

impl AttributeHandler for NameHandler {
    fn apply(&self, object: &mut SceneObject, value: &str, _: &AttributeContext<'_>) -> Result<(), AttributeError> {
        object.node_mut().name = Some(value.to_owned());
        Ok(())
    }
}

struct VisibleHandler;

impl AttributeHandler for VisibleHandler {
    fn apply(&self, object: &mut SceneObject, value: &str, _: &AttributeContext<'_>) -> Result<(), AttributeError> {
        object.set_visible(parse_bool(value)?);
        Ok(())
    }
}

struct PositionHandler;

impl AttributeHandler for PositionHandler {
    fn apply(&self, object: &mut SceneObject, value: &str, _: &AttributeContext<'_>) -> Result<(), AttributeError> {
        object.node_mut().transform.position = parse_vec3(value)?;
        Ok(())
    }
}

struct ScaleHandler;

impl AttributeHandler for ScaleHandler {
    fn apply(&self, object: &mut SceneObject, value: &str, _: &AttributeContext<'_>) -> Result<(), AttributeError> {
        let scale = match parse_components(value)?.as_slice() {
            [s] => Vec3::splat(*s),
            [x, y, z] => Vec3::new(*x, *y, *z),
            _ => return Err(AttributeError::invalid(value, "expected one or three components")),
        };
        object.node_mut().transform.scale = scale;
        Ok(())
    }
}

struct RotationHandler;

impl AttributeHandler for RotationHandler {
    fn apply(&self, object: &mut SceneObject, value: &str, _: &AttributeContext<'_>) -> Result<(), AttributeError> {
        let degrees = parse_vec3(value)?;
        object.node_mut().transform.rotation = Quat::from_euler(
            EulerRot::YXZ,
            degrees.y.to_radians(),
            degrees.x.to_radians(),
            degrees.z.to_radians(),
        );
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Side {
    Width,
    Height,
}

/// `width` or `height`. Each side parses only its own value and reads the
/// other side to complete the quad, so application order does not matter
/// and a malformed sibling does not fail a valid side.
struct SizeHandler {
    side: Side,
}

impl AttributeHandler for SizeHandler {
    fn apply(&self, object: &mut SceneObject, value: &str, ctx: &AttributeContext<'_>) -> Result<(), AttributeError> {
        let own = parse_f32(value)?;
        if own <= 0.0 {
            return Err(AttributeError::invalid(value, "size must be positive"));
        }

        let sibling_key = match self.side {
            Side::Width => "height",
            Side::Height => "width",
        };
        // An unusable sibling reports its own error; this side falls back to a square.
        let sibling = ctx
            .element
            .get(sibling_key)
            .and_then(|v| parse_f32(v).ok())
            .filter(|v| *v > 0.0)
            .unwrap_or(own);

        let (width, height) = match self.side {
            Side::Width => (own, sibling),
            Side::Height => (sibling, own),
        };

        object.node_mut().render_data.mesh = Some(Mesh::Quad { width, height });
        Ok(())
    }
}

/// `texture` and `layout`: material from a resolved resource.
struct SurfaceHandler;

impl AttributeHandler for SurfaceHandler {
    fn apply(&self, object: &mut SceneObject, value: &str, ctx: &AttributeContext<'_>) -> Result<(), AttributeError> {
        let binding = ctx.resolve(value)?;

        let explicit_geometry = ["width", "height", "mesh"]
            .iter()
            .any(|key| ctx.element.contains(key));

        let render_data = &mut object.node_mut().render_data;
        if !explicit_geometry {
            if let Some(size) = binding.size {
                render_data.mesh = Some(Mesh::Quad {
                    width: size.x,
                    height: size.y,
                });
            }
        }
        render_data.material = Some(Material { source: binding });
        Ok(())
    }
}

struct MeshHandler;

impl AttributeHandler for MeshHandler {
    fn apply(&self, object: &mut SceneObject, value: &str, ctx: &AttributeContext<'_>) -> Result<(), AttributeError> {
        if !ResourceRef::is_reference(value) {
            return Err(AttributeError::invalid(value, "expected a resource reference").mandatory());
        }

        let binding = ctx.resolve(value).map_err(|e| AttributeError::from(e).mandatory())?;
        object.node_mut().render_data.mesh = Some(Mesh::Resource(binding));
        Ok(())
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

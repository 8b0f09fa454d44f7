//=========================================================================
// Resource References
//=========================================================================
//
// Symbolic resource strings from markup (`@layout/menu`, `@drawable/logo`)
// and the host callback that turns them into concrete platform resources.
//
// The framework never loads layouts or textures itself. It hands the
// parsed reference to the host's `ResourceResolver` and keeps the result
// as an opaque binding on the scene object.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;

use glam::Vec2;
use thiserror::Error;

//=== Internal Dependencies ===============================================

use crate::core::reclaim::{NativeKind, NativeRegistry, NativeResource, RawHandle};

//=== ResourceRef =========================================================

/// Prefix marking a symbolic resource reference in markup.
pub const RESOURCE_PREFIX: char = '@';

/// Parsed `@<kind>/<name>` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub kind: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Parses `@kind/name`. Returns `None` for anything else, including
    /// references with an empty kind or name.
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.trim().strip_prefix(RESOURCE_PREFIX)?;
        let (kind, name) = rest.split_once('/')?;

        if kind.is_empty() || name.is_empty() {
            return None;
        }

        Some(Self::new(kind, name))
    }

    /// Returns `true` if `value` starts with the reference prefix.
    pub fn is_reference(value: &str) -> bool {
        value.trim_start().starts_with(RESOURCE_PREFIX)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", RESOURCE_PREFIX, self.kind, self.name)
    }
}

//=== ResolvedResource ====================================================

/// What the host returns for a reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedResource {
    pub reference: ResourceRef,

    /// Native handle backing the resource, if the host allocated one.
    pub native: Option<(NativeKind, RawHandle)>,

    /// Intrinsic size in world units (used for auto-sized quads).
    pub size: Option<Vec2>,
}

impl ResolvedResource {
    pub fn new(reference: ResourceRef) -> Self {
        Self {
            reference,
            native: None,
            size: None,
        }
    }

    pub fn with_native(mut self, kind: NativeKind, raw: RawHandle) -> Self {
        self.native = Some((kind, raw));
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.size = Some(Vec2::new(width, height));
        self
    }

    /// Converts into a binding, registering any native handle for reclamation.
    pub fn bind(self, natives: &NativeRegistry) -> ResourceBinding {
        ResourceBinding {
            native: self.native.map(|(kind, raw)| natives.track(kind, raw)),
            reference: self.reference,
            size: self.size,
        }
    }
}

//=== ResourceBinding =====================================================

/// A resolved resource attached to a scene object.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBinding {
    pub reference: ResourceRef,
    pub native: Option<NativeResource>,
    pub size: Option<Vec2>,
}

//=== ResourceResolver ====================================================

/// Failure to resolve a reference. Attribute handlers treat this as a
/// soft failure: the attribute is skipped and the object left unchanged.
#[derive(Debug, Error)]
pub enum ResourceResolutionError {
    #[error("no resource named `{0}`")]
    NotFound(ResourceRef),

    #[error("resource kind `{kind}` is not supported (in `{reference}`)")]
    UnsupportedKind { kind: String, reference: ResourceRef },

    #[error("`{0}` is not a resource reference")]
    Malformed(String),

    #[error("failed to load `{reference}`: {message}")]
    Load { reference: ResourceRef, message: String },
}

/// Host callback mapping symbolic references to platform resources.
pub trait ResourceResolver: Send + Sync {
    fn resolve(&self, reference: &ResourceRef) -> Result<ResolvedResource, ResourceResolutionError>;
}

/// Resolver installed when the host provides none. Fails every lookup.
#[derive(Debug, Default)]
pub struct NullResolver;

impl ResourceResolver for NullResolver {
    fn resolve(&self, reference: &ResourceRef) -> Result<ResolvedResource, ResourceResolutionError> {
        Err(ResourceResolutionError::NotFound(reference.clone()))
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kind_and_name() {
        let reference = ResourceRef::parse("@layout/test").unwrap();
        assert_eq!(reference.kind, "layout");
        assert_eq!(reference.name, "test");
        assert_eq!(reference.to_string(), "@layout/test");
    }

    #[test]
    fn rejects_non_references() {
        assert_eq!(ResourceRef::parse("textures/wood.png"), None);
        assert_eq!(ResourceRef::parse("@layout"), None);
        assert_eq!(ResourceRef::parse("@/name"), None);
        assert_eq!(ResourceRef::parse("@layout/"), None);
    }

    #[test]
    fn name_may_contain_slashes() {
        let reference = ResourceRef::parse("@drawable/ui/panel").unwrap();
        assert_eq!(reference.kind, "drawable");
        assert_eq!(reference.name, "ui/panel");
    }

    #[test]
    fn null_resolver_reports_not_found() {
        let reference = ResourceRef::new("layout", "missing");
        match NullResolver.resolve(&reference) {
            Err(ResourceResolutionError::NotFound(r)) => assert_eq!(r, reference),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }
}

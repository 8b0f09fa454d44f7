//=========================================================================
// Declarative Scene Markup
//=========================================================================
//
// Builds scene trees from XML documents.
//
// Architecture:
//   SceneBuilder
//     ├─ ObjectFactory       type name → object / scene constructor
//     ├─ AttributeRegistry   attribute key → handler
//     ├─ ResourceResolver    "@kind/name" → host resource
//     └─ NativeRegistry      tracks native handles of resolved resources
//
// Document shape:
//   <scene class="Lobby">                      root: scene type
//     <object class="Cube" texture="@layout/x" app:speed="2">
//       <object/>                              nested children
//     </object>
//   </scene>
//
// Attribute classes:
//   class            object type, consumed by the builder
//   xmlns, xmlns:*   namespace declarations, ignored
//   ns:key           pass-through, stored in the object's arguments
//   key              dispatched through the AttributeRegistry
//
//=========================================================================

//=== External Dependencies ===============================================

use thiserror::Error;

//=== Module Declarations =================================================

mod attributes;
mod builder;
mod factory;

//=== Public API ==========================================================

pub use attributes::{
    AttributeContext, AttributeError, AttributeHandler, AttributeRegistry, Dispatch,
    ElementAttributes,
};
pub use builder::{SceneBuilder, CLASS_ATTRIBUTE};
pub use factory::ObjectFactory;

//=== Errors ==============================================================

/// Error returned by a type constructor.
pub type ConstructError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A type name could not be turned into a live object or scene.
#[derive(Debug, Error)]
pub enum TypeResolutionError {
    #[error("no {expected} type registered as `{type_name}`")]
    Unknown {
        type_name: String,
        expected: &'static str,
    },

    #[error("`{type_name}` is registered as an {found} type, not a {expected} type")]
    WrongKind {
        type_name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("constructor for `{type_name}` failed")]
    Construction {
        type_name: String,
        #[source]
        source: ConstructError,
    },

    #[error("required attribute `{attribute}` of `{type_name}` could not be applied")]
    Attribute {
        type_name: String,
        attribute: String,
        #[source]
        source: AttributeError,
    },
}

/// Failure of a whole scene build. Nothing is returned on error.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("malformed markup at byte {position}")]
    Markup {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("element <{element}> is not closed at end of document (byte {position})")]
    Unclosed { position: u64, element: String },

    #[error("failed to read markup")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    TypeResolution(#[from] TypeResolutionError),
}

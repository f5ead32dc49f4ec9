//! Content operation error types.

use contenthub_sdk::types::EntityType;
use thiserror::Error;

use crate::event::EventError;

/// Errors returned by the type registry and the content coordinator.
#[derive(Debug, Error)]
pub enum ContentError {
    /// No registered module owns the requested entity type.
    #[error("unknown entity type '{0}'")]
    UnknownEntityType(EntityType),

    /// Two modules registered the same entity type in one registry build.
    #[error("entity type '{entity_type}' registered by both '{first}' and '{second}'")]
    DuplicateTypeRegistration {
        entity_type: EntityType,
        first: String,
        second: String,
    },

    /// An event listener failed, possibly one triggered from inside a
    /// handler; passed through untouched.
    #[error(transparent)]
    Event(#[from] EventError),

    /// A handler looked up other content more levels deep than allowed.
    #[error("content lookup of '{entity_type}' nested deeper than {limit} levels")]
    LookupTooDeep { entity_type: EntityType, limit: usize },

    /// The owning handler failed.
    #[error("handler '{handler}' failed for entity type '{entity_type}'")]
    Handler {
        handler: String,
        entity_type: EntityType,
        #[source]
        source: anyhow::Error,
    },
}

/// Result type alias using ContentError.
pub type ContentResult<T> = Result<T, ContentError>;

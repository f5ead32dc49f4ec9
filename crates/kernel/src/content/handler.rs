//! The capability interface content modules implement.
//!
//! A module contributes one `TypeRegistration` per entity type it owns when
//! the type registry is collected. The coordinator then calls the owning
//! handler directly; handlers return their results instead of writing into a
//! shared payload.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use contenthub_sdk::types::{
    ChangeSet, EntityId, EntityInfo, EntityType, EntityTypeDescriptor, InfoMap,
};

use super::coordinator::ContentCoordinator;
use super::moderation::UpdateReport;
use crate::error::ContentResult;
use crate::event::EventBus;

/// What a handler can reach while serving an operation.
#[derive(Clone, Copy)]
pub struct ContentContext<'a> {
    content: &'a ContentCoordinator,
    depth: usize,
}

impl<'a> ContentContext<'a> {
    pub(crate) fn new(content: &'a ContentCoordinator, depth: usize) -> Self {
        Self { content, depth }
    }

    /// The bus, for triggering module events.
    pub fn bus(&self) -> &'a EventBus {
        self.content.bus()
    }

    /// Look up other content, e.g. what a comment was left on.
    ///
    /// Nested lookups are counted; past the coordinator's limit this fails
    /// with `ContentError::LookupTooDeep`.
    pub fn get_content(
        &self,
        entity_type: &str,
        id: EntityId,
    ) -> ContentResult<Option<EntityInfo>> {
        self.content.lookup(entity_type, id, self.depth + 1)
    }

    /// How many lookups enclose the current handler call.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Operations a module provides for the entity types it owns.
pub trait ContentHandler: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Build info views for the ids that exist; missing ids are omitted.
    fn get_info(
        &self,
        ctx: ContentContext<'_>,
        entity_type: &EntityType,
        ids: &[EntityId],
    ) -> Result<InfoMap>;

    /// Apply requested status changes through the moderation state machine.
    fn update_info(
        &self,
        ctx: ContentContext<'_>,
        entity_type: &EntityType,
        changes: &ChangeSet,
    ) -> Result<UpdateReport>;

    /// Permanently remove records; missing ids are ignored.
    fn delete(&self, ctx: ContentContext<'_>, entity_type: &EntityType, ids: &[EntityId])
    -> Result<()>;
}

/// A descriptor paired with the handler that owns its entity type.
#[derive(Clone)]
pub struct TypeRegistration {
    pub descriptor: EntityTypeDescriptor,
    pub handler: Arc<dyn ContentHandler>,
}

impl TypeRegistration {
    pub fn new(descriptor: EntityTypeDescriptor, handler: Arc<dyn ContentHandler>) -> Self {
        Self {
            descriptor,
            handler,
        }
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.descriptor.entity_type
    }
}

impl fmt::Debug for TypeRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistration")
            .field("entity_type", &self.descriptor.entity_type)
            .field("plugin_key", &self.descriptor.plugin_key)
            .field("handler", &self.handler.name())
            .finish()
    }
}

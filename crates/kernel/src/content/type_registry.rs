//! Entity type registry.
//!
//! Built by triggering the `content.collect_types` collector event: every
//! module adds one `TypeRegistration` per entity type it owns. The registry
//! is immutable once built; when the set of active modules may have changed
//! it is collected again from scratch rather than patched.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use contenthub_sdk::types::{EntityType, EntityTypeDescriptor};
use tracing::{debug, info};

use super::handler::TypeRegistration;
use crate::config::Config;
use crate::error::{ContentError, ContentResult};
use crate::event::{CollectorEvent, EventBus, names};

/// Registered entity types and their owning handlers.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: BTreeMap<EntityType, TypeRegistration>,
}

impl TypeRegistry {
    /// Collect entity types from every module bound to the bus.
    ///
    /// Types owned by plugins disabled in `config` are skipped. A type
    /// registered twice is a configuration error.
    pub fn collect(bus: &EventBus, config: &Config) -> ContentResult<Self> {
        info!("collecting entity types from modules");

        let event = bus.trigger(CollectorEvent::<TypeRegistration>::new(names::COLLECT_TYPES))?;

        let registrations = event.into_list().into_iter().filter(|r| {
            let disabled = config.is_plugin_disabled(&r.descriptor.plugin_key);
            if disabled {
                info!(
                    plugin = %r.descriptor.plugin_key,
                    entity_type = %r.descriptor.entity_type,
                    "skipping entity type of disabled plugin"
                );
            }
            !disabled
        });

        let registry = Self::from_registrations(registrations)?;
        info!(count = registry.len(), "entity types collected");
        Ok(registry)
    }

    /// Build a registry from registrations, rejecting duplicate keys.
    pub fn from_registrations(
        registrations: impl IntoIterator<Item = TypeRegistration>,
    ) -> ContentResult<Self> {
        let mut entries = BTreeMap::new();

        for registration in registrations {
            match entries.entry(registration.entity_type().clone()) {
                Entry::Occupied(existing) => {
                    let existing: &TypeRegistration = existing.get();
                    return Err(ContentError::DuplicateTypeRegistration {
                        entity_type: registration.entity_type().clone(),
                        first: existing.descriptor.plugin_key.clone(),
                        second: registration.descriptor.plugin_key.clone(),
                    });
                }
                Entry::Vacant(slot) => {
                    debug!(
                        entity_type = %registration.descriptor.entity_type,
                        plugin = %registration.descriptor.plugin_key,
                        handler = %registration.handler.name(),
                        "registered entity type"
                    );
                    slot.insert(registration);
                }
            }
        }

        Ok(Self { entries })
    }

    /// Get the descriptor of an entity type.
    pub fn describe(&self, entity_type: &str) -> ContentResult<&EntityTypeDescriptor> {
        self.entries
            .get(entity_type)
            .map(|r| &r.descriptor)
            .ok_or_else(|| ContentError::UnknownEntityType(EntityType::new(entity_type)))
    }

    /// Get the registration (descriptor and owning handler) of an entity type.
    pub fn registration(&self, entity_type: &str) -> Option<&TypeRegistration> {
        self.entries.get(entity_type)
    }

    /// All descriptors keyed by entity type.
    pub fn types(&self) -> BTreeMap<EntityType, EntityTypeDescriptor> {
        self.entries
            .iter()
            .map(|(key, r)| (key.clone(), r.descriptor.clone()))
            .collect()
    }

    /// Iterate descriptors in entity type order.
    pub fn descriptors(&self) -> impl Iterator<Item = &EntityTypeDescriptor> {
        self.entries.values().map(|r| &r.descriptor)
    }

    /// Descriptors grouped by their admin panel group.
    pub fn groups(&self) -> BTreeMap<&str, Vec<&EntityTypeDescriptor>> {
        let mut groups: BTreeMap<&str, Vec<&EntityTypeDescriptor>> = BTreeMap::new();
        for descriptor in self.descriptors() {
            groups
                .entry(descriptor.group.as_str())
                .or_default()
                .push(descriptor);
        }
        groups
    }

    /// Check if an entity type is registered.
    pub fn contains(&self, entity_type: &str) -> bool {
        self.entries.contains_key(entity_type)
    }

    /// Get the number of registered entity types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Content coordinator.
//!
//! Generic batch operations over any registered entity type. Each operation
//! looks up the single owning handler, calls it, and then triggers the
//! matching `content.*` event with the handler's result as data so other
//! modules can observe or enrich it. The payload returned by that trigger is
//! the operation's result.

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use contenthub_sdk::types::{ChangeSet, EntityId, EntityInfo, EntityType, InfoMap};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::handler::{ContentContext, TypeRegistration};
use super::moderation::UpdateReport;
use super::notifier::{self, Announcement};
use super::type_registry::TypeRegistry;
use crate::config::Config;
use crate::error::{ContentError, ContentResult};
use crate::event::{Event, EventBus, EventError, names};

/// Upper bound on nested content lookups made from inside handlers.
pub const MAX_LOOKUP_DEPTH: usize = 16;

/// Entry point for content operations.
///
/// Cheap to clone; clones share the bus and the registry.
#[derive(Clone)]
pub struct ContentCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    bus: Arc<EventBus>,
    registry: RwLock<Arc<TypeRegistry>>,
    config: Config,
}

impl ContentCoordinator {
    /// Create a coordinator and collect the type registry from the bus.
    pub fn new(bus: Arc<EventBus>, config: Config) -> ContentResult<Self> {
        let registry = TypeRegistry::collect(&bus, &config)?;
        Ok(Self::with_registry(bus, registry, config))
    }

    /// Create a coordinator over an already built registry.
    pub fn with_registry(bus: Arc<EventBus>, registry: TypeRegistry, config: Config) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                bus,
                registry: RwLock::new(Arc::new(registry)),
                config,
            }),
        }
    }

    /// A handle that does not keep the coordinator alive.
    pub fn downgrade(&self) -> WeakCoordinator {
        WeakCoordinator {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The registry currently in use.
    pub fn registry(&self) -> Arc<TypeRegistry> {
        Arc::clone(&self.inner.registry.read())
    }

    /// Collect the registry again and swap it in wholesale.
    ///
    /// On failure the previous registry stays in place.
    pub fn rebuild(&self) -> ContentResult<()> {
        let registry = TypeRegistry::collect(&self.inner.bus, &self.inner.config)?;
        info!(count = registry.len(), "type registry rebuilt");
        *self.inner.registry.write() = Arc::new(registry);
        Ok(())
    }

    /// Get info views for `ids`. Ids without a record are omitted.
    pub fn get_info(&self, entity_type: &str, ids: &[EntityId]) -> ContentResult<InfoMap> {
        self.info_at(entity_type, ids, 0)
    }

    /// Get the info view of a single entity.
    pub fn get_content(&self, entity_type: &str, id: EntityId) -> ContentResult<Option<EntityInfo>> {
        self.lookup(entity_type, id, 0)
    }

    /// Single-entity lookup at a given nesting depth.
    pub(crate) fn lookup(
        &self,
        entity_type: &str,
        id: EntityId,
        depth: usize,
    ) -> ContentResult<Option<EntityInfo>> {
        Ok(self.info_at(entity_type, &[id], depth)?.remove(&id))
    }

    /// Deepest lookup nesting allowed, capped by the dispatch depth limit.
    pub fn lookup_limit(&self) -> usize {
        self.inner
            .config
            .max_dispatch_depth
            .map_or(MAX_LOOKUP_DEPTH, |limit| limit.min(MAX_LOOKUP_DEPTH))
    }

    fn info_at(&self, entity_type: &str, ids: &[EntityId], depth: usize) -> ContentResult<InfoMap> {
        if ids.is_empty() {
            return Ok(InfoMap::new());
        }
        let limit = self.lookup_limit();
        if depth > limit {
            return Err(ContentError::LookupTooDeep {
                entity_type: EntityType::new(entity_type),
                limit,
            });
        }
        let Some(owner) = self.owner(entity_type)? else {
            return Ok(InfoMap::new());
        };

        let requested: BTreeSet<EntityId> = ids.iter().copied().collect();
        let mut found = owner
            .handler
            .get_info(self.context(depth), owner.entity_type(), ids)
            .map_err(|source| handler_error(&owner, source))?;
        found.retain(|id, _| requested.contains(id));

        let event = self.bus().trigger(operation_event(
            names::GET_INFO,
            owner.entity_type(),
            requested.iter(),
            found,
        ))?;

        let mut found = event.into_data();
        found.retain(|id, _| requested.contains(id));
        debug!(
            entity_type = %entity_type,
            requested = requested.len(),
            found = found.len(),
            "content info loaded"
        );
        Ok(found)
    }

    /// Apply requested status changes. Failures of single ids are reported,
    /// not raised, and never roll back the others.
    pub fn update_info(&self, entity_type: &str, changes: &ChangeSet) -> ContentResult<UpdateReport> {
        if changes.is_empty() {
            return Ok(UpdateReport::default());
        }
        let Some(owner) = self.owner(entity_type)? else {
            return Ok(UpdateReport::default());
        };

        let report = owner
            .handler
            .update_info(self.context(0), owner.entity_type(), changes)
            .map_err(|source| handler_error(&owner, source))?;

        for (id, error) in &report.failed {
            warn!(entity_type = %entity_type, entity_id = %id, error = %error, "status update failed");
        }

        let event = self.bus().trigger(operation_event(
            names::UPDATE_INFO,
            owner.entity_type(),
            changes.keys(),
            report,
        ))?;

        let report = event.into_data();
        info!(
            entity_type = %entity_type,
            applied = report.applied.len(),
            unchanged = report.unchanged.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            "content updated"
        );
        Ok(report)
    }

    /// Permanently remove entities. Missing ids are ignored.
    pub fn delete(&self, entity_type: &str, ids: &[EntityId]) -> ContentResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let Some(owner) = self.owner(entity_type)? else {
            return Ok(());
        };

        owner
            .handler
            .delete(self.context(0), owner.entity_type(), ids)
            .map_err(|source| handler_error(&owner, source))?;

        self.bus().trigger(operation_event(
            names::DELETE,
            owner.entity_type(),
            ids.iter(),
            ids.to_vec(),
        ))?;

        info!(entity_type = %entity_type, count = ids.len(), "content deleted");
        Ok(())
    }

    /// Fire a lifecycle event. Returns false when it was suppressed.
    pub fn announce(&self, announcement: Announcement) -> ContentResult<bool> {
        Ok(notifier::announce(self.bus(), announcement)?)
    }

    fn context(&self, depth: usize) -> ContentContext<'_> {
        ContentContext::new(self, depth)
    }

    /// Find the owning handler, or decide what an unknown type means.
    fn owner(&self, entity_type: &str) -> ContentResult<Option<TypeRegistration>> {
        if let Some(registration) = self.registry().registration(entity_type) {
            return Ok(Some(registration.clone()));
        }

        if self.inner.config.strict_entity_types {
            return Err(ContentError::UnknownEntityType(EntityType::new(entity_type)));
        }
        debug!(entity_type = %entity_type, "no handler for entity type, nothing to do");
        Ok(None)
    }
}

impl std::fmt::Debug for ContentCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCoordinator")
            .field("types", &self.registry().len())
            .field("strict", &self.inner.config.strict_entity_types)
            .finish()
    }
}

/// Weak handle to a coordinator, for modules bound before it exists.
#[derive(Clone, Default)]
pub struct WeakCoordinator {
    inner: Weak<CoordinatorInner>,
}

impl WeakCoordinator {
    /// The coordinator, if it is still alive.
    pub fn upgrade(&self) -> Option<ContentCoordinator> {
        self.inner
            .upgrade()
            .map(|inner| ContentCoordinator { inner })
    }
}

impl std::fmt::Debug for WeakCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakCoordinator")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Build an operation event with `{entityType, entityIds}` params.
fn operation_event<'a, D>(
    name: &str,
    entity_type: &EntityType,
    ids: impl IntoIterator<Item = &'a EntityId>,
    data: D,
) -> Event<D> {
    let ids: Vec<Value> = ids
        .into_iter()
        .map(|id| Value::String(id.to_string()))
        .collect();
    Event::with_data(name, data)
        .with_param("entityType", entity_type.as_str())
        .with_param("entityIds", ids)
}

/// Wrap a handler failure. Failed events the handler triggered and nested
/// lookup errors keep their own variants.
fn handler_error(owner: &TypeRegistration, source: anyhow::Error) -> ContentError {
    let source = match source.downcast::<EventError>() {
        Ok(event) => return ContentError::Event(event),
        Err(source) => source,
    };
    match source.downcast::<ContentError>() {
        Ok(nested) => nested,
        Err(source) => ContentError::Handler {
            handler: owner.handler.name().to_string(),
            entity_type: owner.entity_type().clone(),
            source,
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::handler::ContentHandler;
    use crate::content::moderation::{ModerationAction, apply_changes};
    use contenthub_sdk::types::{EntityTypeDescriptor, ModerationStatus, StatusChange};
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    /// Handler over an in-memory status table.
    #[derive(Default)]
    struct StatusHandler {
        records: Mutex<BTreeMap<EntityId, ModerationStatus>>,
    }

    impl StatusHandler {
        fn with(records: &[(EntityId, ModerationStatus)]) -> Arc<Self> {
            Arc::new(Self {
                records: Mutex::new(records.iter().copied().collect()),
            })
        }
    }

    impl ContentHandler for StatusHandler {
        fn name(&self) -> &str {
            "status"
        }

        fn get_info(
            &self,
            _ctx: ContentContext<'_>,
            _entity_type: &EntityType,
            _ids: &[EntityId],
        ) -> anyhow::Result<InfoMap> {
            // Returns every record, requested or not.
            Ok(self
                .records
                .lock()
                .iter()
                .map(|(&id, &status)| (id, EntityInfo::new(id, id, 0, status)))
                .collect())
        }

        fn update_info(
            &self,
            _ctx: ContentContext<'_>,
            _entity_type: &EntityType,
            changes: &ChangeSet,
        ) -> anyhow::Result<UpdateReport> {
            let current = self.records.lock().clone();
            Ok(apply_changes(
                changes,
                |id| Ok(current.get(&id).copied()),
                |id, action| {
                    self.records.lock().insert(id, action.target());
                    Ok(())
                },
            ))
        }

        fn delete(
            &self,
            _ctx: ContentContext<'_>,
            _entity_type: &EntityType,
            ids: &[EntityId],
        ) -> anyhow::Result<()> {
            let mut records = self.records.lock();
            for id in ids {
                records.remove(id);
            }
            Ok(())
        }
    }

    struct FailingHandler;

    impl ContentHandler for FailingHandler {
        fn name(&self) -> &str {
            "failing"
        }

        fn get_info(
            &self,
            _ctx: ContentContext<'_>,
            _entity_type: &EntityType,
            _ids: &[EntityId],
        ) -> anyhow::Result<InfoMap> {
            anyhow::bail!("store unavailable")
        }

        fn update_info(
            &self,
            _ctx: ContentContext<'_>,
            _entity_type: &EntityType,
            _changes: &ChangeSet,
        ) -> anyhow::Result<UpdateReport> {
            anyhow::bail!("store unavailable")
        }

        fn delete(
            &self,
            _ctx: ContentContext<'_>,
            _entity_type: &EntityType,
            _ids: &[EntityId],
        ) -> anyhow::Result<()> {
            anyhow::bail!("store unavailable")
        }
    }

    /// Handler whose every entity looks itself up again.
    struct SelfReferencing {
        deepest: Mutex<usize>,
    }

    impl ContentHandler for SelfReferencing {
        fn name(&self) -> &str {
            "self-referencing"
        }

        fn get_info(
            &self,
            ctx: ContentContext<'_>,
            entity_type: &EntityType,
            ids: &[EntityId],
        ) -> anyhow::Result<InfoMap> {
            {
                let mut deepest = self.deepest.lock();
                *deepest = (*deepest).max(ctx.depth());
            }
            let mut out = InfoMap::new();
            for &id in ids {
                let mut info = EntityInfo::new(id, id, 0, ModerationStatus::Active);
                info.label = match ctx.get_content(entity_type.as_str(), id) {
                    Ok(inner) => inner.and_then(|inner| inner.label).or_else(|| Some("leaf".to_string())),
                    Err(ContentError::LookupTooDeep { .. }) => None,
                    Err(e) => return Err(e.into()),
                };
                out.insert(id, info);
            }
            Ok(out)
        }

        fn update_info(
            &self,
            ctx: ContentContext<'_>,
            _entity_type: &EntityType,
            _changes: &ChangeSet,
        ) -> anyhow::Result<UpdateReport> {
            ctx.bus().trigger(Event::<Value>::new("note.touched"))?;
            Ok(UpdateReport::default())
        }

        fn delete(
            &self,
            _ctx: ContentContext<'_>,
            _entity_type: &EntityType,
            _ids: &[EntityId],
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn coordinator(handler: Arc<dyn ContentHandler>, config: Config) -> ContentCoordinator {
        let bus = Arc::new(EventBus::new());
        coordinator_on(bus, handler, config)
    }

    fn coordinator_on(
        bus: Arc<EventBus>,
        handler: Arc<dyn ContentHandler>,
        config: Config,
    ) -> ContentCoordinator {
        let registry = TypeRegistry::from_registrations([TypeRegistration::new(
            EntityTypeDescriptor::new("note", "notes"),
            handler,
        )])
        .unwrap();
        ContentCoordinator::with_registry(bus, registry, config)
    }

    fn lenient() -> Config {
        Config {
            strict_entity_types: false,
            ..Config::default()
        }
    }

    #[test]
    fn get_info_returns_only_requested_existing_ids() {
        let (a, b, c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let missing = Uuid::now_v7();
        let handler = StatusHandler::with(&[
            (a, ModerationStatus::Active),
            (b, ModerationStatus::Approval),
            (c, ModerationStatus::Suspended),
        ]);
        let content = coordinator(handler, Config::default());

        let info = content.get_info("note", &[a, c, missing]).unwrap();

        assert_eq!(info.keys().copied().collect::<Vec<_>>(), {
            let mut expected = vec![a, c];
            expected.sort();
            expected
        });
        assert_eq!(info[&c].status, ModerationStatus::Suspended);
    }

    #[test]
    fn empty_batches_are_empty_for_any_type() {
        let content = coordinator(StatusHandler::with(&[]), Config::default());

        assert!(content.get_info("note", &[]).unwrap().is_empty());
        assert!(content.get_info("unregistered", &[]).unwrap().is_empty());
        assert!(content.update_info("note", &ChangeSet::new()).unwrap().is_clean());
        content.delete("unregistered", &[]).unwrap();
    }

    #[test]
    fn unknown_type_is_an_error_in_strict_mode() {
        let content = coordinator(StatusHandler::with(&[]), Config::default());
        let id = Uuid::now_v7();

        let err = content.get_info("photo", &[id]).unwrap_err();
        assert!(matches!(err, ContentError::UnknownEntityType(ref t) if t.as_str() == "photo"));
        assert!(content.delete("photo", &[id]).is_err());
    }

    #[test]
    fn unknown_type_is_a_no_op_in_lenient_mode() {
        let content = coordinator(StatusHandler::with(&[]), lenient());
        let id = Uuid::now_v7();

        assert!(content.get_info("photo", &[id]).unwrap().is_empty());
        let changes: ChangeSet = [(id, StatusChange::to(ModerationStatus::Active))].into();
        assert_eq!(content.update_info("photo", &changes).unwrap(), UpdateReport::default());
        content.delete("photo", &[id]).unwrap();
    }

    #[test]
    fn observers_see_and_enrich_results() {
        let id = Uuid::now_v7();
        let bus = Arc::new(EventBus::new());
        bus.bind(names::GET_INFO, |_, event: &mut Event<InfoMap>| {
            anyhow::ensure!(
                event.param("entityType").and_then(Value::as_str) == Some("note"),
                "entityType param missing"
            );
            for info in event.data_mut().values_mut() {
                info.label = Some("enriched".to_string());
            }
            Ok(())
        })
        .unwrap();
        let content = coordinator_on(
            bus,
            StatusHandler::with(&[(id, ModerationStatus::Active)]),
            Config::default(),
        );

        let info = content.get_content("note", id).unwrap().unwrap();
        assert_eq!(info.label.as_deref(), Some("enriched"));
    }

    #[test]
    fn update_applies_transitions_and_notifies_observers() {
        let (pending, suspended) = (Uuid::now_v7(), Uuid::now_v7());
        let missing = Uuid::now_v7();
        let observed = Arc::new(Mutex::new(Vec::new()));
        let bus = Arc::new(EventBus::new());
        {
            let observed = Arc::clone(&observed);
            bus.bind(names::UPDATE_INFO, move |_, event: &mut Event<UpdateReport>| {
                let ids: Vec<EntityId> = event.param_as("entityIds").unwrap_or_default();
                observed.lock().extend(ids);
                Ok(())
            })
            .unwrap();
        }
        let handler = StatusHandler::with(&[
            (pending, ModerationStatus::Approval),
            (suspended, ModerationStatus::Suspended),
        ]);
        let content = coordinator_on(bus, handler.clone(), Config::default());

        let changes: ChangeSet = [
            (pending, StatusChange::to(ModerationStatus::Active)),
            (suspended, StatusChange::to(ModerationStatus::Approval)),
            (missing, StatusChange::to(ModerationStatus::Active)),
        ]
        .into();
        let report = content.update_info("note", &changes).unwrap();

        assert_eq!(report.applied[&pending], ModerationAction::Approve);
        assert_eq!(report.applied[&suspended], ModerationAction::Disapprove);
        assert_eq!(report.missing, vec![missing]);
        assert_eq!(handler.records.lock()[&suspended], ModerationStatus::Approval);
        assert_eq!(observed.lock().len(), 3);
    }

    #[test]
    fn delete_ignores_missing_ids() {
        let id = Uuid::now_v7();
        let handler = StatusHandler::with(&[(id, ModerationStatus::Active)]);
        let content = coordinator(handler.clone(), Config::default());

        content.delete("note", &[Uuid::now_v7()]).unwrap();
        assert_eq!(handler.records.lock().len(), 1);

        content.delete("note", &[id]).unwrap();
        assert!(handler.records.lock().is_empty());
    }

    #[test]
    fn handler_failure_names_the_handler() {
        let content = coordinator(Arc::new(FailingHandler), Config::default());

        let err = content.get_info("note", &[Uuid::now_v7()]).unwrap_err();
        match err {
            ContentError::Handler {
                handler,
                entity_type,
                source,
            } => {
                assert_eq!(handler, "failing");
                assert_eq!(entity_type.as_str(), "note");
                assert_eq!(source.to_string(), "store unavailable");
            }
            other => panic!("expected handler error, got {other:?}"),
        }
    }

    #[test]
    fn rebuild_swaps_the_registry() {
        let enabled = Arc::new(AtomicBool::new(false));
        let bus = Arc::new(EventBus::new());
        {
            let enabled = Arc::clone(&enabled);
            bus.bind(
                names::COLLECT_TYPES,
                move |_, event: &mut crate::event::CollectorEvent<TypeRegistration>| {
                    if enabled.load(Ordering::SeqCst) {
                        event.add(TypeRegistration::new(
                            EntityTypeDescriptor::new("note", "notes"),
                            StatusHandler::with(&[]),
                        ));
                    }
                    Ok(())
                },
            )
            .unwrap();
        }
        bus.freeze();

        let content = ContentCoordinator::new(bus, Config::default()).unwrap();
        assert!(!content.registry().contains("note"));

        enabled.store(true, Ordering::SeqCst);
        content.rebuild().unwrap();
        assert!(content.registry().contains("note"));
    }

    #[test]
    fn nested_lookups_stop_at_the_limit() {
        let handler = Arc::new(SelfReferencing {
            deepest: Mutex::new(0),
        });
        let content = coordinator(handler.clone(), Config::default());
        let id = Uuid::now_v7();

        let info = content.get_content("note", id).unwrap().unwrap();

        assert_eq!(content.lookup_limit(), MAX_LOOKUP_DEPTH);
        assert_eq!(*handler.deepest.lock(), MAX_LOOKUP_DEPTH);
        assert_eq!(info.label.as_deref(), Some("leaf"));
    }

    #[test]
    fn dispatch_depth_tightens_the_lookup_limit() {
        let handler = Arc::new(SelfReferencing {
            deepest: Mutex::new(0),
        });
        let config = Config {
            max_dispatch_depth: Some(3),
            ..Config::default()
        };
        let content = coordinator(handler.clone(), config);

        content.get_content("note", Uuid::now_v7()).unwrap();

        assert_eq!(content.lookup_limit(), 3);
        assert_eq!(*handler.deepest.lock(), 3);
    }

    #[test]
    fn failed_events_inside_handlers_stay_event_errors() {
        let bus = Arc::new(EventBus::new());
        bus.bind("note.touched", |_, _: &mut Event| Err(anyhow::anyhow!("audit log offline")))
            .unwrap();
        let handler = Arc::new(SelfReferencing {
            deepest: Mutex::new(0),
        });
        let content = coordinator_on(bus, handler, Config::default());
        let changes: ChangeSet =
            [(Uuid::now_v7(), StatusChange::to(ModerationStatus::Active))].into();

        let err = content.update_info("note", &changes).unwrap_err();

        assert!(matches!(
            err,
            ContentError::Event(EventError::ListenerFailed { ref event, .. }) if event == "note.touched"
        ));
    }

    #[test]
    fn weak_handle_does_not_outlive_the_coordinator() {
        let content = coordinator(StatusHandler::with(&[]), Config::default());
        let weak = content.downgrade();

        assert!(weak.upgrade().is_some());
        drop(content);
        assert!(weak.upgrade().is_none());
        assert!(WeakCoordinator::default().upgrade().is_none());
    }
}

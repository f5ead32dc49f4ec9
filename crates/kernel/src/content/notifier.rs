//! Lifecycle announcements.
//!
//! Modules announce that content was added, changed or is about to be
//! deleted; feeds and notification services consume the three
//! `content.after_*`/`content.before_delete` events through a
//! [`NotificationSink`].

use std::sync::Arc;

use anyhow::Context;
use contenthub_sdk::types::{EntityId, EntityType, LifecycleKind, MessageTemplate};
use tracing::{debug, info};

use super::locale::{KeyTranslator, Translator};
use crate::event::{Event, EventBus, EventError, names};

/// Data carried by lifecycle events.
pub type LifecycleEvent = Event<Option<MessageTemplate>>;

/// A lifecycle notification about one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub kind: LifecycleKind,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub message: Option<MessageTemplate>,
    /// `false` suppresses `AfterChange` announcements.
    pub moderable: bool,
}

impl Announcement {
    pub fn new(kind: LifecycleKind, entity_type: impl Into<EntityType>, entity_id: EntityId) -> Self {
        Self {
            kind,
            entity_type: entity_type.into(),
            entity_id,
            message: None,
            moderable: true,
        }
    }

    pub fn after_add(entity_type: impl Into<EntityType>, entity_id: EntityId) -> Self {
        Self::new(LifecycleKind::AfterAdd, entity_type, entity_id)
    }

    pub fn after_change(entity_type: impl Into<EntityType>, entity_id: EntityId) -> Self {
        Self::new(LifecycleKind::AfterChange, entity_type, entity_id)
    }

    pub fn before_delete(entity_type: impl Into<EntityType>, entity_id: EntityId) -> Self {
        Self::new(LifecycleKind::BeforeDelete, entity_type, entity_id)
    }

    pub fn with_message(mut self, message: MessageTemplate) -> Self {
        self.message = Some(message);
        self
    }

    pub fn moderable(mut self, moderable: bool) -> Self {
        self.moderable = moderable;
        self
    }

    /// Whether announcing this is a no-op.
    pub fn is_suppressed(&self) -> bool {
        self.kind == LifecycleKind::AfterChange && !self.moderable
    }

    fn into_event(self) -> LifecycleEvent {
        Event::with_data(event_name(self.kind), self.message)
            .with_param("entityType", self.entity_type.as_str())
            .with_param("entityId", self.entity_id.to_string())
            .with_param("isModerable", self.moderable)
    }

    fn from_event(kind: LifecycleKind, event: &LifecycleEvent) -> anyhow::Result<Self> {
        let entity_type: String = event
            .param_as("entityType")
            .with_context(|| format!("{} without entityType", event.name()))?;
        let entity_id: EntityId = event
            .param_as("entityId")
            .with_context(|| format!("{} without a valid entityId", event.name()))?;

        Ok(Self {
            kind,
            entity_type: entity_type.into(),
            entity_id,
            message: event.data().clone(),
            moderable: event.flag("isModerable", true),
        })
    }
}

/// Event name for a lifecycle kind.
pub fn event_name(kind: LifecycleKind) -> &'static str {
    match kind {
        LifecycleKind::AfterAdd => names::AFTER_ADD,
        LifecycleKind::AfterChange => names::AFTER_CHANGE,
        LifecycleKind::BeforeDelete => names::BEFORE_DELETE,
    }
}

/// Trigger the lifecycle event for an announcement.
///
/// Returns `Ok(false)` without triggering when the announcement is a
/// suppressed `AfterChange`.
pub fn announce(bus: &EventBus, announcement: Announcement) -> Result<bool, EventError> {
    if announcement.is_suppressed() {
        debug!(
            entity_type = %announcement.entity_type,
            entity_id = %announcement.entity_id,
            "change announcement suppressed"
        );
        return Ok(false);
    }

    bus.trigger(announcement.into_event())?;
    Ok(true)
}

/// Consumer of lifecycle announcements (activity feed, notifications).
pub trait NotificationSink: Send + Sync {
    fn notify(&self, announcement: &Announcement) -> anyhow::Result<()>;
}

/// Bind a sink to all three lifecycle events at the default priority.
pub fn bind_sink(bus: &EventBus, sink: Arc<dyn NotificationSink>) -> Result<(), EventError> {
    for kind in [
        LifecycleKind::AfterAdd,
        LifecycleKind::AfterChange,
        LifecycleKind::BeforeDelete,
    ] {
        let sink = Arc::clone(&sink);
        bus.bind(event_name(kind), move |_, event: &mut LifecycleEvent| {
            let announcement = Announcement::from_event(kind, event)?;
            sink.notify(&announcement)
        })?;
    }
    Ok(())
}

/// Sink that writes announcements to the log.
pub struct LogSink {
    translator: Arc<dyn Translator>,
}

impl LogSink {
    pub fn new(translator: Arc<dyn Translator>) -> Self {
        Self { translator }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(Arc::new(KeyTranslator))
    }
}

impl NotificationSink for LogSink {
    fn notify(&self, announcement: &Announcement) -> anyhow::Result<()> {
        let message = announcement
            .message
            .as_ref()
            .map(|m| self.translator.text(m))
            .unwrap_or_default();
        info!(
            kind = ?announcement.kind,
            entity_type = %announcement.entity_type,
            entity_id = %announcement.entity_id,
            message = %message,
            "content lifecycle"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Announcement>>);

    impl NotificationSink for Collect {
        fn notify(&self, announcement: &Announcement) -> anyhow::Result<()> {
            self.0.lock().push(announcement.clone());
            Ok(())
        }
    }

    fn bus_with_sink() -> (EventBus, Arc<Collect>) {
        let bus = EventBus::new();
        let sink = Arc::new(Collect::default());
        bind_sink(&bus, sink.clone()).unwrap();
        (bus, sink)
    }

    #[test]
    fn sink_receives_announcements() {
        let (bus, sink) = bus_with_sink();
        let id = Uuid::now_v7();
        let sent = Announcement::after_add("comment", id).with_message(
            MessageTemplate::new("base+comment_added_string").with_var("entityType", "photo"),
        );

        assert!(announce(&bus, sent.clone()).unwrap());

        assert_eq!(*sink.0.lock(), vec![sent]);
    }

    #[test]
    fn unmoderable_change_is_suppressed() {
        let (bus, sink) = bus_with_sink();
        let id = Uuid::now_v7();

        let suppressed = Announcement::after_change("avatar-change", id).moderable(false);
        let delivered = announce(&bus, suppressed).unwrap();

        assert!(!delivered);
        assert!(sink.0.lock().is_empty());
    }

    #[test]
    fn moderable_flag_only_affects_changes() {
        let (bus, sink) = bus_with_sink();
        let id = Uuid::now_v7();

        announce(&bus, Announcement::after_add("user_join", id).moderable(false)).unwrap();
        announce(&bus, Announcement::before_delete("user_join", id).moderable(false)).unwrap();

        let kinds: Vec<_> = sink.0.lock().iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![LifecycleKind::AfterAdd, LifecycleKind::BeforeDelete]);
    }

    #[test]
    fn malformed_lifecycle_event_fails_the_listener() {
        let (bus, sink) = bus_with_sink();

        let err = bus
            .trigger(LifecycleEvent::new(names::AFTER_ADD).with_param("entityType", "comment"))
            .unwrap_err();

        assert!(matches!(err, EventError::ListenerFailed { .. }));
        assert!(sink.0.lock().is_empty());
    }

    #[test]
    fn log_sink_accepts_everything() {
        let bus = EventBus::new();
        bind_sink(&bus, Arc::new(LogSink::default())).unwrap();

        assert!(announce(&bus, Announcement::before_delete("comment", Uuid::now_v7())).unwrap());
    }
}

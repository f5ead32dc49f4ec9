//! ContentHub test utilities.
//!
//! Helpers for integration testing: record fixtures, a recording
//! notification sink, a fixed-content module and a ready-wired harness.

use std::collections::BTreeMap;
use std::sync::Arc;

use contenthub_base::{
    Attachment, AvatarRecord, BaseContentProvider, CommentRecord, MemoryStores, UserRecord,
};
use contenthub_kernel::content::{
    Announcement, ContentContext, ContentHandler, KeyTranslator, NotificationSink, Translator,
    TypeRegistration, UpdateReport, bind_sink,
};
use contenthub_kernel::event::{CollectorEvent, EventBus, names};
use contenthub_kernel::{Config, ContentCoordinator};
use contenthub_sdk::types::{
    ChangeSet, ContentRef, EntityId, EntityInfo, EntityType, EntityTypeDescriptor, InfoMap,
    LifecycleKind, ModerationStatus,
};
use parking_lot::Mutex;
use uuid::Uuid;

/// Base URL the harness serves avatars from.
pub const AVATAR_BASE_URL: &str = "https://cdn.example.com/avatars";

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Create a test user awaiting approval.
pub fn test_user(email: &str) -> TestUser {
    TestUser {
        record: UserRecord {
            id: Uuid::now_v7(),
            email: email.to_string(),
            join_stamp: now(),
            join_ip: "127.0.0.1".to_string(),
            activity_stamp: now(),
            approved: false,
            suspended: false,
        },
    }
}

/// A test user builder.
#[derive(Debug, Clone)]
pub struct TestUser {
    record: UserRecord,
}

impl TestUser {
    /// Set a custom ID.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.record.id = id;
        self
    }

    /// Set as approved.
    pub fn approved(mut self) -> Self {
        self.record.approved = true;
        self
    }

    /// Set as suspended.
    pub fn suspended(mut self) -> Self {
        self.record.approved = true;
        self.record.suspended = true;
        self
    }

    pub fn joined_at(mut self, stamp: i64) -> Self {
        self.record.join_stamp = stamp;
        self
    }

    pub fn id(&self) -> EntityId {
        self.record.id
    }

    pub fn build(self) -> UserRecord {
        self.record
    }
}

/// Create an active test comment left on `target`.
pub fn test_comment(target: ContentRef, message: &str) -> TestComment {
    TestComment {
        record: CommentRecord {
            id: Uuid::now_v7(),
            author_id: Uuid::nil(),
            target,
            message: message.to_string(),
            create_stamp: now(),
            attachment: None,
            status: ModerationStatus::Active,
            flagged: false,
        },
    }
}

/// A test comment builder.
#[derive(Debug, Clone)]
pub struct TestComment {
    record: CommentRecord,
}

impl TestComment {
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.record.id = id;
        self
    }

    /// Set the author.
    pub fn by(mut self, author_id: Uuid) -> Self {
        self.record.author_id = author_id;
        self
    }

    pub fn with_status(mut self, status: ModerationStatus) -> Self {
        self.record.status = status;
        self
    }

    pub fn flagged(mut self) -> Self {
        self.record.flagged = true;
        self
    }

    /// Attach a photo.
    pub fn with_photo(mut self, url: &str) -> Self {
        self.record.attachment = Some(Attachment {
            kind: "photo".to_string(),
            url: Some(url.to_string()),
            thumbnail_url: None,
            title: None,
            description: None,
        });
        self
    }

    pub fn id(&self) -> EntityId {
        self.record.id
    }

    pub fn build(self) -> CommentRecord {
        self.record
    }
}

/// Create an active test avatar for `user_id`.
pub fn test_avatar(user_id: Uuid) -> TestAvatar {
    TestAvatar {
        record: AvatarRecord {
            id: Uuid::now_v7(),
            user_id,
            hash: now(),
            status: ModerationStatus::Active,
        },
    }
}

/// A test avatar builder.
#[derive(Debug, Clone)]
pub struct TestAvatar {
    record: AvatarRecord,
}

impl TestAvatar {
    pub fn with_status(mut self, status: ModerationStatus) -> Self {
        self.record.status = status;
        self
    }

    pub fn with_hash(mut self, hash: i64) -> Self {
        self.record.hash = hash;
        self
    }

    pub fn id(&self) -> EntityId {
        self.record.id
    }

    pub fn build(self) -> AvatarRecord {
        self.record
    }
}

/// Notification sink that keeps every announcement it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    seen: Mutex<Vec<Announcement>>,
}

impl RecordingSink {
    pub fn announcements(&self) -> Vec<Announcement> {
        self.seen.lock().clone()
    }

    /// Announcements of one kind, in arrival order.
    pub fn of_kind(&self, kind: LifecycleKind) -> Vec<Announcement> {
        self.seen
            .lock()
            .iter()
            .filter(|a| a.kind == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }

    pub fn clear(&self) {
        self.seen.lock().clear();
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, announcement: &Announcement) -> anyhow::Result<()> {
        self.seen.lock().push(announcement.clone());
        Ok(())
    }
}

/// Read-only content module serving fixed info views for one entity type.
///
/// Stands in for third-party modules (photos, blog posts) that comments are
/// left on.
pub struct FixedContent {
    entity_type: EntityType,
    plugin_key: String,
    items: BTreeMap<EntityId, EntityInfo>,
}

impl FixedContent {
    pub fn new(entity_type: &str, plugin_key: &str) -> Self {
        Self {
            entity_type: EntityType::new(entity_type),
            plugin_key: plugin_key.to_string(),
            items: BTreeMap::new(),
        }
    }

    /// Add an active item with a label and URL; returns its reference.
    pub fn add(&mut self, label: &str, url: &str) -> ContentRef {
        let id = Uuid::now_v7();
        let info = EntityInfo::new(id, Uuid::nil(), now(), ModerationStatus::Active)
            .with_label(label)
            .with_content_url(url);
        self.items.insert(id, info);
        ContentRef::new(self.entity_type.clone(), id)
    }

    /// Bind the type registration for this module.
    pub fn bind(self, bus: &EventBus) -> anyhow::Result<()> {
        let descriptor = EntityTypeDescriptor::new(self.entity_type.clone(), self.plugin_key.clone())
            .with_group(self.plugin_key.clone(), self.plugin_key.clone());
        let handler: Arc<dyn ContentHandler> = Arc::new(self);
        bus.bind(
            names::COLLECT_TYPES,
            move |_, event: &mut CollectorEvent<TypeRegistration>| {
                event.add(TypeRegistration::new(descriptor.clone(), Arc::clone(&handler)));
                Ok(())
            },
        )?;
        Ok(())
    }
}

impl ContentHandler for FixedContent {
    fn name(&self) -> &str {
        &self.plugin_key
    }

    fn get_info(
        &self,
        _ctx: ContentContext<'_>,
        _entity_type: &EntityType,
        ids: &[EntityId],
    ) -> anyhow::Result<InfoMap> {
        Ok(ids
            .iter()
            .filter_map(|id| self.items.get(id).map(|info| (*id, info.clone())))
            .collect())
    }

    fn update_info(
        &self,
        _ctx: ContentContext<'_>,
        _entity_type: &EntityType,
        changes: &ChangeSet,
    ) -> anyhow::Result<UpdateReport> {
        Ok(UpdateReport {
            unchanged: changes.keys().copied().collect(),
            ..UpdateReport::default()
        })
    }

    fn delete(
        &self,
        _ctx: ContentContext<'_>,
        _entity_type: &EntityType,
        _ids: &[EntityId],
    ) -> anyhow::Result<()> {
        anyhow::bail!("{} content is read-only", self.entity_type)
    }
}

/// A bus with the base module, a recording sink and a coordinator.
pub struct Harness {
    pub bus: Arc<EventBus>,
    pub content: ContentCoordinator,
    pub stores: MemoryStores,
    pub sink: Arc<RecordingSink>,
    pub provider: Arc<BaseContentProvider>,
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness").finish_non_exhaustive()
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }
}

type Setup = Box<dyn FnOnce(&EventBus) -> anyhow::Result<()>>;

/// Builder for [`Harness`].
#[derive(Default)]
pub struct HarnessBuilder {
    users: Vec<UserRecord>,
    comments: Vec<CommentRecord>,
    avatars: Vec<AvatarRecord>,
    modules: Vec<FixedContent>,
    config: Option<Config>,
    translator: Option<Arc<dyn Translator>>,
    setup: Vec<Setup>,
}

impl HarnessBuilder {
    pub fn user(mut self, user: TestUser) -> Self {
        self.users.push(user.build());
        self
    }

    pub fn comment(mut self, comment: TestComment) -> Self {
        self.comments.push(comment.build());
        self
    }

    pub fn avatar(mut self, avatar: TestAvatar) -> Self {
        self.avatars.push(avatar.build());
        self
    }

    /// Register another content module next to the base module.
    pub fn module(mut self, module: FixedContent) -> Self {
        self.modules.push(module);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Run `setup` against the bus before it is frozen (extra listeners).
    pub fn on_bus(mut self, setup: impl FnOnce(&EventBus) -> anyhow::Result<()> + 'static) -> Self {
        self.setup.push(Box::new(setup));
        self
    }

    /// Bind everything, freeze the bus and collect the registry.
    pub fn build(self) -> anyhow::Result<Harness> {
        let config = self.config.unwrap_or_default();
        let bus = Arc::new(EventBus::from_config(&config));

        let stores = MemoryStores::new(self.users, self.comments, self.avatars, AVATAR_BASE_URL);
        let provider = stores.provider(
            self.translator
                .unwrap_or_else(|| Arc::new(KeyTranslator) as Arc<dyn Translator>),
        );
        provider.bind(&bus)?;
        for module in self.modules {
            module.bind(&bus)?;
        }
        for setup in self.setup {
            setup(&bus)?;
        }

        let sink = Arc::new(RecordingSink::default());
        bind_sink(&bus, sink.clone())?;
        bus.freeze();

        let content = ContentCoordinator::new(Arc::clone(&bus), config)?;
        provider.attach(&content);
        Ok(Harness {
            bus,
            content,
            stores,
            sink,
            provider,
        })
    }
}

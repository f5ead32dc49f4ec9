//! In-memory stores.
//!
//! Used by the CLI and tests in place of a database.

use std::sync::Arc;

use anyhow::Result;
use contenthub_kernel::content::{KeyTranslator, Translator};
use contenthub_sdk::types::{EntityId, ImageSize};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::provider::BaseContentProvider;
use crate::records::{AvatarRecord, CommentRecord, Record, UserRecord};
use crate::store::{AvatarStore, EntityStore, UserStore};

/// Concurrent map of records keyed by id.
pub struct MemoryStore<R> {
    records: DashMap<EntityId, R>,
}

impl<R: Record> MemoryStore<R> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn from_records(records: impl IntoIterator<Item = R>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    pub fn insert(&self, record: R) {
        self.records.insert(record.id(), record);
    }

    pub fn get(&self, id: EntityId) -> Option<R> {
        self.records.get(&id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, ordered by id.
    pub fn snapshot(&self) -> Vec<R> {
        let mut records: Vec<R> = self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.id());
        records
    }
}

impl<R: Record> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> EntityStore<R> for MemoryStore<R> {
    fn find_by_id(&self, id: EntityId) -> Result<Option<R>> {
        Ok(self.get(id))
    }

    fn update(&self, record: R) -> Result<()> {
        let id = record.id();
        anyhow::ensure!(self.records.contains_key(&id), "record {id} does not exist");
        self.records.insert(id, record);
        Ok(())
    }

    fn delete(&self, id: EntityId) -> Result<bool> {
        Ok(self.records.remove(&id).is_some())
    }
}

/// User store that records approval notifications instead of sending mail.
#[derive(Default)]
pub struct MemoryUserStore {
    users: MemoryStore<UserRecord>,
    notified: Mutex<Vec<EntityId>>,
}

impl MemoryUserStore {
    pub fn new(users: impl IntoIterator<Item = UserRecord>) -> Self {
        Self {
            users: MemoryStore::from_records(users),
            notified: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> &MemoryStore<UserRecord> {
        &self.users
    }

    /// Users an approval notification was sent to, in send order.
    pub fn notifications(&self) -> Vec<EntityId> {
        self.notified.lock().clone()
    }
}

impl EntityStore<UserRecord> for MemoryUserStore {
    fn find_by_id(&self, id: EntityId) -> Result<Option<UserRecord>> {
        self.users.find_by_id(id)
    }

    fn update(&self, record: UserRecord) -> Result<()> {
        self.users.update(record)
    }

    fn delete(&self, id: EntityId) -> Result<bool> {
        self.users.delete(id)
    }
}

impl UserStore for MemoryUserStore {
    fn send_approval_notification(&self, user: &UserRecord) -> Result<()> {
        debug!(user_id = %user.id, email = %user.email, "approval notification queued");
        self.notified.lock().push(user.id);
        Ok(())
    }
}

/// Avatar store serving images from a base URL.
pub struct MemoryAvatarStore {
    avatars: MemoryStore<AvatarRecord>,
    base_url: String,
}

impl MemoryAvatarStore {
    pub fn new(base_url: impl Into<String>, avatars: impl IntoIterator<Item = AvatarRecord>) -> Self {
        Self {
            avatars: MemoryStore::from_records(avatars),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn records(&self) -> &MemoryStore<AvatarRecord> {
        &self.avatars
    }
}

impl EntityStore<AvatarRecord> for MemoryAvatarStore {
    fn find_by_id(&self, id: EntityId) -> Result<Option<AvatarRecord>> {
        self.avatars.find_by_id(id)
    }

    fn update(&self, record: AvatarRecord) -> Result<()> {
        self.avatars.update(record)
    }

    fn delete(&self, id: EntityId) -> Result<bool> {
        self.avatars.delete(id)
    }
}

impl AvatarStore for MemoryAvatarStore {
    fn url(&self, avatar: &AvatarRecord, size: ImageSize) -> String {
        // The view size is served from the full-size file.
        let variant = match size {
            ImageSize::Thumbnail => 1,
            ImageSize::Preview => 2,
            ImageSize::View | ImageSize::Fullsize => 3,
        };
        format!(
            "{}/avatar_{}_{}_{}.jpg",
            self.base_url, avatar.user_id, variant, avatar.hash
        )
    }
}

/// The three base module stores, shared with the provider.
#[derive(Clone)]
pub struct MemoryStores {
    pub users: Arc<MemoryUserStore>,
    pub comments: Arc<MemoryStore<CommentRecord>>,
    pub avatars: Arc<MemoryAvatarStore>,
}

impl MemoryStores {
    pub fn new(
        users: impl IntoIterator<Item = UserRecord>,
        comments: impl IntoIterator<Item = CommentRecord>,
        avatars: impl IntoIterator<Item = AvatarRecord>,
        avatar_base_url: impl Into<String>,
    ) -> Self {
        Self {
            users: Arc::new(MemoryUserStore::new(users)),
            comments: Arc::new(MemoryStore::from_records(comments)),
            avatars: Arc::new(MemoryAvatarStore::new(avatar_base_url, avatars)),
        }
    }

    /// Build a provider over these stores.
    pub fn provider(&self, translator: Arc<dyn Translator>) -> Arc<BaseContentProvider> {
        Arc::new(BaseContentProvider::new(
            self.users.clone(),
            self.comments.clone(),
            self.avatars.clone(),
            translator,
        ))
    }

    /// Build a provider that renders message keys untranslated.
    pub fn untranslated_provider(&self) -> Arc<BaseContentProvider> {
        self.provider(Arc::new(KeyTranslator))
    }
}

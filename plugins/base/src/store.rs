//! Store collaborators the base module reads and writes through.

use anyhow::Result;
use contenthub_sdk::types::{EntityId, ImageSize};

use crate::records::{AvatarRecord, CommentRecord, Record, UserRecord};

/// Persistence for one entity kind.
pub trait EntityStore<R: Record>: Send + Sync {
    fn find_by_id(&self, id: EntityId) -> Result<Option<R>>;

    /// Records for the ids that exist, in request order.
    fn find_by_ids(&self, ids: &[EntityId]) -> Result<Vec<R>> {
        let mut found = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(record) = self.find_by_id(id)? {
                found.push(record);
            }
        }
        Ok(found)
    }

    /// Replace the stored record with the same id.
    fn update(&self, record: R) -> Result<()>;

    /// Remove a record. Returns false when it did not exist.
    fn delete(&self, id: EntityId) -> Result<bool>;
}

/// User accounts.
pub trait UserStore: EntityStore<UserRecord> {
    /// Tell the user their account was approved.
    fn send_approval_notification(&self, user: &UserRecord) -> Result<()>;
}

/// Comments.
pub trait CommentStore: EntityStore<CommentRecord> {}

impl<T: EntityStore<CommentRecord>> CommentStore for T {}

/// Avatars.
pub trait AvatarStore: EntityStore<AvatarRecord> {
    fn url(&self, avatar: &AvatarRecord, size: ImageSize) -> String;
}

//! Stored records of the entity kinds the base module owns.

use contenthub_sdk::types::{ContentRef, EntityId, ModerationStatus};
use serde::{Deserialize, Serialize};

/// Anything kept in an entity store.
pub trait Record: Clone + Send + Sync + 'static {
    fn id(&self) -> EntityId;
}

/// User account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: EntityId,
    pub email: String,

    /// Unix timestamp of registration.
    pub join_stamp: i64,

    #[serde(default)]
    pub join_ip: String,

    /// Unix timestamp of last activity.
    #[serde(default)]
    pub activity_stamp: i64,

    #[serde(default)]
    pub approved: bool,

    #[serde(default)]
    pub suspended: bool,
}

impl UserRecord {
    pub fn is_approved(&self) -> bool {
        self.approved
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Moderation status derived from the approval and suspension flags.
    ///
    /// Suspension wins over approval.
    pub fn status(&self) -> ModerationStatus {
        if self.suspended {
            ModerationStatus::Suspended
        } else if self.approved {
            ModerationStatus::Active
        } else {
            ModerationStatus::Approval
        }
    }
}

impl Record for UserRecord {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// Link, photo or video attached to a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment kind (`photo`, `link`, `video`, ...).
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Attachment {
    pub fn is_photo(&self) -> bool {
        self.kind == "photo"
    }
}

/// Comment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: EntityId,

    /// Author user ID.
    pub author_id: EntityId,

    /// Content the comment was left on.
    pub target: ContentRef,

    pub message: String,

    /// Unix timestamp when created.
    pub create_stamp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,

    pub status: ModerationStatus,

    #[serde(default)]
    pub flagged: bool,
}

impl Record for CommentRecord {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// Avatar record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarRecord {
    pub id: EntityId,
    pub user_id: EntityId,

    /// Cache-busting hash; the upload timestamp.
    pub hash: i64,

    pub status: ModerationStatus,
}

impl Record for AvatarRecord {
    fn id(&self) -> EntityId {
        self.id
    }
}

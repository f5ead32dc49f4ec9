//! Core types shared by the kernel and content modules.
//!
//! Everything here is plain data: descriptors a module contributes while the
//! type registry is collected, the uniform info view handlers build on demand,
//! and the change sets moderation tooling sends back.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a single content record (UUIDv7, time-sortable).
pub type EntityId = Uuid;

/// Info views keyed by entity id, as returned by `get_info`.
pub type InfoMap = BTreeMap<EntityId, EntityInfo>;

/// Requested status changes keyed by entity id, as sent to `update_info`.
pub type ChangeSet = BTreeMap<EntityId, StatusChange>;

/// Registered key of a category of moderatable content (e.g. "comment").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for EntityType {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl AsRef<str> for EntityType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for EntityType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Moderation status of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    /// Waiting for a moderator to approve it.
    Approval,
    /// Visible.
    Active,
    /// Hidden by a moderator.
    Suspended,
}

impl ModerationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approval => "approval",
            Self::Active => "active",
            Self::Suspended => "suspended",
        }
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModerationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approval" => Ok(Self::Approval),
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            other => Err(format!(
                "unknown moderation status '{other}' (expected approval, active or suspended)"
            )),
        }
    }
}

/// Moderation tools an entity type supports in the admin panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationTool {
    Approve,
    Flag,
}

/// How the moderation UI lays out entities of a type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFormat {
    #[default]
    Content,
    ImageContent,
    Image,
    Empty,
}

/// Size tag of an image reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSize {
    Thumbnail,
    Preview,
    View,
    Fullsize,
}

impl ImageSize {
    pub const ALL: [ImageSize; 4] = [
        ImageSize::Thumbnail,
        ImageSize::Preview,
        ImageSize::View,
        ImageSize::Fullsize,
    ];
}

/// Static metadata describing an entity type, contributed by its owning module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeDescriptor {
    /// Unique registry key.
    pub entity_type: EntityType,

    /// Module that owns the type.
    pub plugin_key: String,

    /// Authorization group moderators need access to.
    pub authorization_group: String,

    /// Admin panel group (e.g. "comments").
    pub group: String,

    /// Display label of the group.
    pub group_label: String,

    /// Display label of a single entity.
    pub entity_label: String,

    #[serde(default)]
    pub display_format: DisplayFormat,

    #[serde(default = "default_moderation_tools")]
    pub moderation_tools: BTreeSet<ModerationTool>,
}

fn default_moderation_tools() -> BTreeSet<ModerationTool> {
    BTreeSet::from([ModerationTool::Approve, ModerationTool::Flag])
}

impl EntityTypeDescriptor {
    /// Create a descriptor with both moderation tools and the plugin key as
    /// authorization group.
    pub fn new(entity_type: impl Into<EntityType>, plugin_key: impl Into<String>) -> Self {
        let plugin_key = plugin_key.into();
        Self {
            entity_type: entity_type.into(),
            authorization_group: plugin_key.clone(),
            plugin_key,
            group: String::new(),
            group_label: String::new(),
            entity_label: String::new(),
            display_format: DisplayFormat::default(),
            moderation_tools: default_moderation_tools(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>, label: impl Into<String>) -> Self {
        self.group = group.into();
        self.group_label = label.into();
        self
    }

    pub fn with_entity_label(mut self, label: impl Into<String>) -> Self {
        self.entity_label = label.into();
        self
    }

    pub fn with_authorization_group(mut self, group: impl Into<String>) -> Self {
        self.authorization_group = group.into();
        self
    }

    pub fn with_display_format(mut self, format: DisplayFormat) -> Self {
        self.display_format = format;
        self
    }

    /// Replace the supported moderation tools.
    pub fn with_moderation_tools(mut self, tools: impl IntoIterator<Item = ModerationTool>) -> Self {
        self.moderation_tools = tools.into_iter().collect();
        self
    }

    pub fn supports(&self, tool: ModerationTool) -> bool {
        self.moderation_tools.contains(&tool)
    }
}

/// Uniform view of one entity, built by its handler on demand.
///
/// Optional fields are omitted from the serialized form when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityInfo {
    pub id: EntityId,

    /// User that owns (authored) the entity.
    pub owner_id: EntityId,

    /// Unix timestamp the entity was created or last replaced.
    pub timestamp: i64,

    pub status: ModerationStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flagged: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub images: BTreeMap<ImageSize, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,

    /// Kind-specific fields (e.g. a profile's email).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl EntityInfo {
    pub fn new(id: EntityId, owner_id: EntityId, timestamp: i64, status: ModerationStatus) -> Self {
        Self {
            id,
            owner_id,
            timestamp,
            status,
            flagged: None,
            label: None,
            text: None,
            title: None,
            description: None,
            images: BTreeMap::new(),
            content_url: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_flagged(mut self, flagged: bool) -> Self {
        self.flagged = Some(flagged);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_image(mut self, size: ImageSize, url: impl Into<String>) -> Self {
        self.images.insert(size, url.into());
        self
    }

    pub fn with_content_url(mut self, url: impl Into<String>) -> Self {
        self.content_url = Some(url.into());
        self
    }

    /// Set a kind-specific field. Values that fail to serialize are skipped.
    pub fn with_extra<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.extra.insert(key.to_string(), v);
        }
        self
    }
}

/// A requested change for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: ModerationStatus,

    /// New flag value, for kinds that support flagging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flagged: Option<bool>,
}

impl StatusChange {
    pub fn to(status: ModerationStatus) -> Self {
        Self {
            status,
            flagged: None,
        }
    }

    pub fn with_flagged(mut self, flagged: bool) -> Self {
        self.flagged = Some(flagged);
        self
    }
}

/// A localizable message: a language key plus substitution variables.
///
/// Rendering is left to the localization collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub key: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,
}

impl MessageTemplate {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            vars: BTreeMap::new(),
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

/// Kind of content lifecycle announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    AfterAdd,
    AfterChange,
    BeforeDelete,
}

/// Reference to another piece of content (e.g. what a comment was left on).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
}

impl ContentRef {
    pub fn new(entity_type: impl Into<EntityType>, entity_id: EntityId) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
        }
    }
}

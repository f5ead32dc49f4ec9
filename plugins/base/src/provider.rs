//! Content provider for profiles, comments and avatars.
//!
//! Owns three entity types. Besides serving the content operations it
//! translates account, comment and avatar events into lifecycle
//! announcements so feeds and moderation queues pick them up.

use std::sync::Arc;

use anyhow::{Context, Result};
use contenthub_kernel::ContentResult;
use contenthub_kernel::content::{
    Announcement, ConsoleEvent, ConsoleItem, ContentContext, ContentCoordinator, ContentHandler,
    ModerationAction, Translator, TypeRegistration, UpdateReport, WeakCoordinator, announce,
    apply_changes,
};
use contenthub_kernel::event::{CollectorEvent, Event, EventBus, EventError, names};
use contenthub_sdk::types::{
    ChangeSet, DisplayFormat, EntityId, EntityInfo, EntityType, EntityTypeDescriptor, ImageSize,
    InfoMap, MessageTemplate, ModerationTool,
};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::events;
use crate::records::{AvatarRecord, CommentRecord, UserRecord};
use crate::store::{AvatarStore, CommentStore, UserStore};

pub const PLUGIN_KEY: &str = "base";

/// User profiles, moderated when they join.
pub const PROFILE: &str = "user_join";

pub const COMMENT: &str = "comment";

pub const AVATAR: &str = "avatar-change";

const CONSOLE_ITEM_ID: &str = "base-moderation";
const CONSOLE_ITEM_ORDER: i32 = 10;

/// Handler for the base module's entity types.
pub struct BaseContentProvider {
    users: Arc<dyn UserStore>,
    comments: Arc<dyn CommentStore>,
    avatars: Arc<dyn AvatarStore>,
    translator: Arc<dyn Translator>,
    /// Set by `attach`; listeners use it to look up commented content.
    content: RwLock<WeakCoordinator>,
}

impl BaseContentProvider {
    pub fn new(
        users: Arc<dyn UserStore>,
        comments: Arc<dyn CommentStore>,
        avatars: Arc<dyn AvatarStore>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            users,
            comments,
            avatars,
            translator,
            content: RwLock::new(WeakCoordinator::default()),
        }
    }

    /// Let event listeners look up content through `content`.
    pub fn attach(&self, content: &ContentCoordinator) {
        *self.content.write() = content.downgrade();
    }

    /// Descriptors of the entity types this module owns.
    pub fn descriptors() -> Vec<EntityTypeDescriptor> {
        vec![
            EntityTypeDescriptor::new(PROFILE, PLUGIN_KEY)
                .with_group("profiles", "Profiles")
                .with_entity_label("Profile")
                .with_display_format(DisplayFormat::Empty),
            EntityTypeDescriptor::new(COMMENT, PLUGIN_KEY)
                .with_group("comments", "Comments")
                .with_entity_label("Comment")
                .with_moderation_tools([ModerationTool::Flag]),
            EntityTypeDescriptor::new(AVATAR, PLUGIN_KEY)
                .with_group("avatars", "Avatars")
                .with_entity_label("Avatar"),
        ]
    }

    /// Bind the type registration and the lifecycle translation listeners.
    pub fn bind(self: &Arc<Self>, bus: &EventBus) -> Result<(), EventError> {
        let provider = Arc::clone(self);
        bus.bind(
            names::COLLECT_TYPES,
            move |_, event: &mut CollectorEvent<TypeRegistration>| {
                for descriptor in Self::descriptors() {
                    event.add(TypeRegistration::new(descriptor, provider.clone()));
                }
                Ok(())
            },
        )?;

        bus.bind(events::USER_REGISTER, |bus, event: &mut Event| {
            let user_id = id_param(event, "userId")?;
            announce(
                bus,
                Announcement::after_add(PROFILE, user_id)
                    .with_message(MessageTemplate::new("base+feed_user_join")),
            )?;
            Ok(())
        })?;

        let provider = Arc::clone(self);
        bus.bind(events::USER_EDIT, move |bus, event: &mut Event| {
            let Some(user_id) = event.param_as::<EntityId>("userId") else {
                return Ok(());
            };
            if provider.users.find_by_id(user_id)?.is_none() || !event.flag("moderate", false) {
                return Ok(());
            }
            announce(
                bus,
                Announcement::after_change(PROFILE, user_id).with_message(
                    MessageTemplate::new("base+moderation_user_update")
                        .with_var("userId", user_id.to_string()),
                ),
            )?;
            Ok(())
        })?;

        bus.bind(events::USER_UNREGISTER, |bus, event: &mut Event| {
            let user_id = id_param(event, "userId")?;
            announce(bus, Announcement::before_delete(PROFILE, user_id))?;
            Ok(())
        })?;

        bus.bind(events::USER_APPROVE, |bus, event: &mut Event| {
            let user_id = id_param(event, "userId")?;
            bus.trigger(
                Event::<Value>::new(names::MODERATION_APPROVE)
                    .with_param("entityType", PROFILE)
                    .with_param("entityId", user_id.to_string()),
            )?;
            Ok(())
        })?;

        let provider = Arc::clone(self);
        bus.bind(events::ADD_COMMENT, move |bus, event: &mut Event| {
            let comment_id = id_param(event, "commentId")?;
            let entity_type: String = event
                .param_as("entityType")
                .with_context(|| format!("{} requires entityType", event.name()))?;
            let entity_id = id_param(event, "entityId")?;

            let mut message = MessageTemplate::new("base+comment_added_string")
                .with_var("entityType", entity_type.as_str())
                .with_var("entityId", entity_id.to_string());
            let target = provider.commented_content(comment_id, &entity_type, entity_id);
            if let Some(content) = target {
                message = with_content_vars(message, &content);
            }
            announce(
                bus,
                Announcement::after_add(COMMENT, comment_id).with_message(message),
            )?;
            Ok(())
        })?;

        bus.bind_with_priority(
            events::AFTER_AVATAR_UPDATE,
            events::AVATAR_CHANGE_PRIORITY,
            |bus, event: &mut Event| {
                let avatar_id = id_param(event, "avatarId")?;
                let announcement = Announcement::after_change(AVATAR, avatar_id)
                    .with_message(MessageTemplate::new("base+avatar_update_string"))
                    .moderable(event.flag("isModerable", true));
                announce(bus, announcement)?;
                Ok(())
            },
        )?;

        bus.bind(events::BEFORE_USER_AVATAR_DELETE, |bus, event: &mut Event| {
            let avatar_id = id_param(event, "avatarId")?;
            announce(bus, Announcement::before_delete(AVATAR, avatar_id))?;
            Ok(())
        })?;

        let provider = Arc::clone(self);
        bus.bind(names::CONSOLE_COLLECT_ITEMS, move |_, event: &mut ConsoleEvent| {
            let label = provider
                .translator
                .text(&MessageTemplate::new("base+console_moderation"));
            event.add(
                ConsoleItem::new(label)
                    .with_id(CONSOLE_ITEM_ID)
                    .with_order(CONSOLE_ITEM_ORDER),
            );
            Ok(())
        })?;

        debug!(plugin = PLUGIN_KEY, "base content provider bound");
        Ok(())
    }

    fn profile_info(&self, ids: &[EntityId]) -> Result<InfoMap> {
        let users = self.users.find_by_ids(ids).context("load users")?;
        Ok(users
            .into_iter()
            .map(|user| (user.id, profile_view(&user)))
            .collect())
    }

    fn comment_info(&self, ctx: ContentContext<'_>, ids: &[EntityId]) -> Result<InfoMap> {
        let comments = self.comments.find_by_ids(ids).context("load comments")?;

        let mut out = InfoMap::new();
        for comment in comments {
            let mut info = comment_view(&comment);
            info.label = self.content_label(ctx, &comment);
            out.insert(comment.id, info);
        }
        Ok(out)
    }

    /// Label naming what a comment was left on.
    fn content_label(&self, ctx: ContentContext<'_>, comment: &CommentRecord) -> Option<String> {
        let target = &comment.target;
        let content = resolved(
            comment.id,
            target.entity_type.as_str(),
            ctx.get_content(target.entity_type.as_str(), target.entity_id),
        )
        .filter(|content| content.label.is_some())?;
        let template =
            with_content_vars(MessageTemplate::new("base+comment_content_label"), &content);
        Some(self.translator.text(&template))
    }

    /// What a new comment was left on, looked up through the attached
    /// coordinator.
    fn commented_content(
        &self,
        comment_id: EntityId,
        entity_type: &str,
        entity_id: EntityId,
    ) -> Option<EntityInfo> {
        let Some(content) = self.content.read().upgrade() else {
            debug!(comment_id = %comment_id, "no coordinator attached, comment target not resolved");
            return None;
        };
        resolved(comment_id, entity_type, content.get_content(entity_type, entity_id))
    }

    fn avatar_info(&self, ids: &[EntityId]) -> Result<InfoMap> {
        let avatars = self.avatars.find_by_ids(ids).context("load avatars")?;
        Ok(avatars
            .into_iter()
            .map(|avatar| (avatar.id, self.avatar_view(&avatar)))
            .collect())
    }

    fn avatar_view(&self, avatar: &AvatarRecord) -> EntityInfo {
        ImageSize::ALL.into_iter().fold(
            EntityInfo::new(avatar.id, avatar.user_id, avatar.hash, avatar.status),
            |info, size| info.with_image(size, self.avatars.url(avatar, size)),
        )
    }

    /// Moderate profiles, then announce approvals once every change is
    /// stored. A failing approval listener fails the whole update.
    fn update_profiles(&self, ctx: ContentContext<'_>, changes: &ChangeSet) -> Result<UpdateReport> {
        let report = apply_changes(
            changes,
            |id| Ok(self.users.find_by_id(id)?.map(|user| user.status())),
            |id, action| self.moderate_user(id, action),
        );

        for (&id, &action) in &report.applied {
            if action == ModerationAction::Approve {
                ctx.bus().trigger(
                    Event::<Value>::new(events::USER_APPROVE).with_param("userId", id.to_string()),
                )?;
            }
        }
        Ok(report)
    }

    fn moderate_user(&self, id: EntityId, action: ModerationAction) -> Result<()> {
        let mut user = self
            .users
            .find_by_id(id)?
            .with_context(|| format!("user {id} disappeared"))?;

        // Disapproving also lifts a suspension.
        user.approved = action == ModerationAction::Approve;
        user.suspended = false;
        self.users
            .update(user.clone())
            .with_context(|| format!("save user {id}"))?;

        if action == ModerationAction::Approve {
            self.users
                .send_approval_notification(&user)
                .context("send approval notification")?;
        }

        debug!(user_id = %id, action = ?action, "profile moderated");
        Ok(())
    }

    fn update_comments(&self, changes: &ChangeSet) -> UpdateReport {
        let mut report = apply_changes(
            changes,
            |id| Ok(self.comments.find_by_id(id)?.map(|comment| comment.status)),
            |id, action| {
                let mut comment = self
                    .comments
                    .find_by_id(id)?
                    .with_context(|| format!("comment {id} disappeared"))?;
                comment.status = action.target();
                self.comments.update(comment)
            },
        );

        for (&id, change) in changes {
            let Some(flagged) = change.flagged else {
                continue;
            };
            match self.flag_comment(id, flagged) {
                Ok(true) => {
                    report.flagged.insert(id, flagged);
                }
                Ok(false) => {}
                Err(e) => report.record_failure(id, &e),
            }
        }

        report
    }

    /// Set a comment's flag. Returns false when nothing changed.
    fn flag_comment(&self, id: EntityId, flagged: bool) -> Result<bool> {
        let Some(mut comment) = self.comments.find_by_id(id)? else {
            return Ok(false);
        };
        if comment.flagged == flagged {
            return Ok(false);
        }
        comment.flagged = flagged;
        self.comments
            .update(comment)
            .with_context(|| format!("flag comment {id}"))?;
        Ok(true)
    }

    /// Moderate avatars, then fire the avatar update event for each stored
    /// change.
    fn update_avatars(&self, ctx: ContentContext<'_>, changes: &ChangeSet) -> Result<UpdateReport> {
        let mut updated = Vec::new();
        let report = apply_changes(
            changes,
            |id| Ok(self.avatars.find_by_id(id)?.map(|avatar| avatar.status)),
            |id, action| {
                let mut avatar = self
                    .avatars
                    .find_by_id(id)?
                    .with_context(|| format!("avatar {id} disappeared"))?;
                avatar.status = action.target();
                let user_id = avatar.user_id;
                self.avatars
                    .update(avatar)
                    .with_context(|| format!("save avatar {id}"))?;
                updated.push((id, user_id));
                Ok(())
            },
        );

        for (avatar_id, user_id) in updated {
            ctx.bus().trigger(
                Event::<Value>::new(events::AFTER_AVATAR_UPDATE)
                    .with_param("avatarId", avatar_id.to_string())
                    .with_param("userId", user_id.to_string())
                    .with_param("isModerable", true),
            )?;
        }
        Ok(report)
    }
}

impl ContentHandler for BaseContentProvider {
    fn name(&self) -> &str {
        PLUGIN_KEY
    }

    fn get_info(
        &self,
        ctx: ContentContext<'_>,
        entity_type: &EntityType,
        ids: &[EntityId],
    ) -> Result<InfoMap> {
        match entity_type.as_str() {
            PROFILE => self.profile_info(ids),
            COMMENT => self.comment_info(ctx, ids),
            AVATAR => self.avatar_info(ids),
            other => Err(not_owned(other)),
        }
    }

    fn update_info(
        &self,
        ctx: ContentContext<'_>,
        entity_type: &EntityType,
        changes: &ChangeSet,
    ) -> Result<UpdateReport> {
        match entity_type.as_str() {
            PROFILE => self.update_profiles(ctx, changes),
            COMMENT => Ok(self.update_comments(changes)),
            AVATAR => self.update_avatars(ctx, changes),
            other => Err(not_owned(other)),
        }
    }

    fn delete(
        &self,
        _ctx: ContentContext<'_>,
        entity_type: &EntityType,
        ids: &[EntityId],
    ) -> Result<()> {
        for &id in ids {
            let removed = match entity_type.as_str() {
                PROFILE => self.users.delete(id),
                COMMENT => self.comments.delete(id),
                AVATAR => self.avatars.delete(id),
                other => return Err(not_owned(other)),
            }
            .with_context(|| format!("delete {entity_type} {id}"))?;

            if !removed {
                debug!(entity_type = %entity_type, entity_id = %id, "nothing to delete");
            }
        }
        Ok(())
    }
}

fn profile_view(user: &UserRecord) -> EntityInfo {
    EntityInfo::new(user.id, user.id, user.join_stamp, user.status())
        .with_extra("email", &user.email)
        .with_extra("joinIp", &user.join_ip)
        .with_extra("activityStamp", user.activity_stamp)
}

fn comment_view(comment: &CommentRecord) -> EntityInfo {
    let mut info = EntityInfo::new(
        comment.id,
        comment.author_id,
        comment.create_stamp,
        comment.status,
    )
    .with_flagged(comment.flagged)
    .with_text(&comment.message);

    let Some(attachment) = &comment.attachment else {
        return info;
    };

    let url = non_empty(&attachment.url);
    if let Some(preview) = url.as_ref().filter(|_| attachment.is_photo()) {
        info = info.with_image(ImageSize::Preview, preview);
    }
    if let Some(thumbnail) = non_empty(&attachment.thumbnail_url) {
        info = info.with_image(ImageSize::Thumbnail, thumbnail);
    }
    info.title = non_empty(&attachment.title);
    info.description = non_empty(&attachment.description);
    info.content_url = url;
    info
}

/// Add the `content` and `contentUrl` vars naming `content`. Content
/// without a label adds nothing.
fn with_content_vars(mut template: MessageTemplate, content: &EntityInfo) -> MessageTemplate {
    let Some(label) = &content.label else {
        return template;
    };
    template = template.with_var("content", label.to_lowercase());
    if let Some(url) = &content.content_url {
        template = template.with_var("contentUrl", url.as_str());
    }
    template
}

/// The looked up content, logging lookup failures.
fn resolved(
    comment_id: EntityId,
    entity_type: &str,
    lookup: ContentResult<Option<EntityInfo>>,
) -> Option<EntityInfo> {
    match lookup {
        Ok(content) => content,
        Err(e) => {
            warn!(
                comment_id = %comment_id,
                entity_type = %entity_type,
                error = %e,
                "cannot resolve commented content"
            );
            None
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

fn id_param(event: &Event, key: &str) -> Result<EntityId> {
    event
        .param_as(key)
        .with_context(|| format!("{} requires a valid {key}", event.name()))
}

fn not_owned(entity_type: &str) -> anyhow::Error {
    anyhow::anyhow!("entity type '{entity_type}' is not owned by the base module")
}

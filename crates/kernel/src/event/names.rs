//! Stable names of the kernel's bind points.
//!
//! Module-specific events (user joined, avatar changed, ...) are named by the
//! modules that trigger them.

/// Collector of `TypeRegistration`s; triggered when the type registry is built.
pub const COLLECT_TYPES: &str = "content.collect_types";

/// Observers of `get_info` results (`Event<InfoMap>`).
pub const GET_INFO: &str = "content.get_info";

/// Observers of `update_info` outcomes (`Event<UpdateReport>`).
pub const UPDATE_INFO: &str = "content.update_info";

/// Observers of deletions (`Event<Vec<EntityId>>`).
pub const DELETE: &str = "content.delete";

/// Lifecycle announcement: content was added.
pub const AFTER_ADD: &str = "content.after_add";

/// Lifecycle announcement: content was changed.
pub const AFTER_CHANGE: &str = "content.after_change";

/// Lifecycle announcement: content is about to be deleted.
pub const BEFORE_DELETE: &str = "content.before_delete";

/// A moderator approved an entity.
pub const MODERATION_APPROVE: &str = "moderation.approve";

/// Collector of `ConsoleItem`s for the admin console.
pub const CONSOLE_COLLECT_ITEMS: &str = "console.collect_items";


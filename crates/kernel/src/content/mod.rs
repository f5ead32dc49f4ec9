//! Content management module.
//!
//! This module provides:
//! - TypeRegistry: entity type descriptors and their owning handlers
//! - ContentCoordinator: get-info, update-info, delete and announce
//! - Moderation: the status transition table shared by handlers
//! - Notifier: lifecycle announcements and notification sinks
//! - Console: console item collection

mod console;
mod coordinator;
mod handler;
mod locale;
pub mod moderation;
mod notifier;
mod type_registry;

pub use console::{ConsoleEvent, ConsoleItem, collect_console_items};
pub use coordinator::{ContentCoordinator, MAX_LOOKUP_DEPTH, WeakCoordinator};
pub use handler::{ContentContext, ContentHandler, TypeRegistration};
pub use locale::{KeyTranslator, Translator};
pub use moderation::{ModerationAction, UpdateReport, apply_changes, plan_transition};
pub use notifier::{
    Announcement, LifecycleEvent, LogSink, NotificationSink, announce, bind_sink, event_name,
};
pub use type_registry::TypeRegistry;

//! Base content module for ContentHub.
//!
//! Registers the `user_join`, `comment` and `avatar-change` entity types and
//! serves them through the store collaborators in [`store`]. In-memory
//! stores live in [`memory`].

pub mod events;
pub mod memory;
pub mod provider;
pub mod records;
pub mod store;

pub use memory::{MemoryAvatarStore, MemoryStore, MemoryStores, MemoryUserStore};
pub use provider::{AVATAR, BaseContentProvider, COMMENT, PLUGIN_KEY, PROFILE};
pub use records::{Attachment, AvatarRecord, CommentRecord, Record, UserRecord};
pub use store::{AvatarStore, CommentStore, EntityStore, UserStore};

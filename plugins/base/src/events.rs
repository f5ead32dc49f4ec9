//! Events the base module triggers and listens to.
//!
//! Account and avatar services trigger these; the provider translates them
//! into content lifecycle announcements.

/// A user registered. Params: `userId`.
pub const USER_REGISTER: &str = "base.user_register";

/// A user edited their profile. Params: `userId`, `moderate`.
pub const USER_EDIT: &str = "base.user_edit";

/// A user account is about to be removed. Params: `userId`.
pub const USER_UNREGISTER: &str = "base.user_unregister";

/// A user account was approved. Params: `userId`.
pub const USER_APPROVE: &str = "base.user_approve";

/// A comment was posted. Params: `entityType`, `entityId`, `commentId`.
pub const ADD_COMMENT: &str = "base.add_comment";

/// An avatar was replaced or re-moderated. Params: `avatarId`, `userId`,
/// `isModerable`.
pub const AFTER_AVATAR_UPDATE: &str = "base.after_avatar_update";

/// An avatar is about to be removed. Params: `avatarId`.
pub const BEFORE_USER_AVATAR_DELETE: &str = "base.before_user_avatar_delete";

/// Priority of the avatar change listener; runs after the avatar
/// services' own listeners.
pub const AVATAR_CHANGE_PRIORITY: i32 = 10000;

//! ContentHub SDK
//!
//! Data types shared between the kernel and content modules. Modules depend
//! on this crate to describe the entity types they own and to build the info
//! views the kernel hands to moderation tooling.

pub mod types;

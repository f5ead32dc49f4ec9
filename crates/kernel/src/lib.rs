//! ContentHub kernel library.
//!
//! A pluggable entity-type registry on top of a synchronous, priority-ordered
//! event bus. Modules register the entity types they own and a handler for
//! them; the content coordinator drives get-info, update-info and delete
//! through that handler and broadcasts the results and lifecycle events on
//! the bus.

pub mod config;
pub mod content;
pub mod error;
pub mod event;

pub use config::Config;
pub use content::{ContentCoordinator, TypeRegistry};
pub use error::{ContentError, ContentResult};
pub use event::{CollectorEvent, Event, EventBus, EventError};

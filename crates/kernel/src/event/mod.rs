//! Event system for module extension points.
//!
//! Events are named; modules bind listeners to them with a priority and the
//! bus invokes every listener in order (lower priority = earlier) when the
//! event is triggered.

mod bus;
mod collector;
mod error;
pub mod names;
mod payload;

pub use bus::{DEFAULT_PRIORITY, EventBus};
pub use collector::CollectorEvent;
pub use error::EventError;
pub use payload::{Dispatchable, Event, Params};

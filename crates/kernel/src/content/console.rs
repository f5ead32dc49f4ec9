//! Console item collection.
//!
//! The admin console asks modules for the items it shows (menu entries,
//! counters, pending-moderation badges) through the `console.collect_items`
//! collector event.

use serde::{Deserialize, Serialize};

use crate::event::{CollectorEvent, EventBus, EventError, Params, names};

/// One contribution to the console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleItem {
    /// Rendered item (markup or text).
    pub item: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Position hint; lower comes first, items without one go last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl ConsoleItem {
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            id: None,
            order: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }
}

/// Collector event for console items.
pub type ConsoleEvent = CollectorEvent<ConsoleItem>;

/// Collect console items from every bound module.
///
/// Items come back sorted by `order` with unordered items last; items with
/// equal order keep their contribution order.
pub fn collect_console_items(bus: &EventBus, params: Params) -> Result<Vec<ConsoleItem>, EventError> {
    let mut event = ConsoleEvent::new(names::CONSOLE_COLLECT_ITEMS);
    for (key, value) in params {
        event = event.with_param(key, value);
    }

    let mut items = bus.trigger(event)?.into_list();
    items.sort_by_key(|item| (item.order.is_none(), item.order));
    Ok(items)
}

//! Event bus - binds listeners to event names and dispatches synchronously.
//!
//! Listeners run in priority order (lower = earlier), ties broken by
//! registration order. Every listener sees the mutations made by the ones
//! before it. Dispatch is fail-fast with no listener isolation: the first
//! listener error aborts the trigger and is returned to the caller.
//!
//! Lifecycle: construct, bind during setup, `freeze()`, then dispatch.
//! Listeners receive the bus and may trigger further events; nesting is
//! unbounded unless a depth limit is configured. Depth is counted per bus
//! and per thread, so triggers on one bus never use up another's limit.

use std::any::{Any, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use super::error::EventError;
use super::payload::Dispatchable;
use crate::config::Config;

/// Priority used by [`EventBus::bind`].
pub const DEFAULT_PRIORITY: i32 = 1000;

static NEXT_BUS_ID: AtomicU64 = AtomicU64::new(0);

type ListenerFn<E> = dyn Fn(&EventBus, &mut E) -> anyhow::Result<()> + Send + Sync;

/// A bound listener with its ordering keys.
#[derive(Clone)]
struct Registration {
    priority: i32,
    order: u64,
    /// Type name of the event the listener accepts.
    accepts: &'static str,
    /// Holds a `Box<ListenerFn<E>>`.
    listener: Arc<dyn Any + Send + Sync>,
}

impl Registration {
    fn key(&self) -> (i32, u64) {
        (self.priority, self.order)
    }
}

/// Synchronous, priority-ordered publish/subscribe bus.
pub struct EventBus {
    id: u64,
    listeners: RwLock<HashMap<String, Vec<Registration>>>,
    next_order: AtomicU64,
    frozen: AtomicBool,
    max_depth: Option<usize>,
}

impl EventBus {
    /// Create an unfrozen bus without a dispatch depth limit.
    pub fn new() -> Self {
        Self {
            id: NEXT_BUS_ID.fetch_add(1, Ordering::Relaxed),
            listeners: RwLock::new(HashMap::new()),
            next_order: AtomicU64::new(0),
            frozen: AtomicBool::new(false),
            max_depth: None,
        }
    }

    /// Create a bus configured from application config.
    pub fn from_config(config: &Config) -> Self {
        let bus = Self::new();
        match config.max_dispatch_depth {
            Some(limit) => bus.with_max_depth(limit),
            None => bus,
        }
    }

    /// Limit how deeply triggers may nest on one thread.
    pub fn with_max_depth(mut self, limit: usize) -> Self {
        self.max_depth = Some(limit);
        self
    }

    /// Bind a listener at [`DEFAULT_PRIORITY`].
    pub fn bind<E, F>(&self, name: &str, listener: F) -> Result<(), EventError>
    where
        E: Dispatchable,
        F: Fn(&EventBus, &mut E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bind_with_priority(name, DEFAULT_PRIORITY, listener)
    }

    /// Bind a listener for events named `name` of type `E`.
    ///
    /// Binding the same listener twice yields two invocations.
    pub fn bind_with_priority<E, F>(
        &self,
        name: &str,
        priority: i32,
        listener: F,
    ) -> Result<(), EventError>
    where
        E: Dispatchable,
        F: Fn(&EventBus, &mut E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let boxed: Box<ListenerFn<E>> = Box::new(listener);

        let mut listeners = self.listeners.write();
        if self.is_frozen() {
            return Err(EventError::Frozen {
                event: name.to_string(),
            });
        }

        let registration = Registration {
            priority,
            order: self.next_order.fetch_add(1, Ordering::Relaxed),
            accepts: type_name::<E>(),
            listener: Arc::new(boxed),
        };

        let bound = listeners.entry(name.to_string()).or_default();
        let at = bound.partition_point(|r| r.key() <= registration.key());
        bound.insert(at, registration);

        trace!(event = %name, priority, "listener bound");
        Ok(())
    }

    /// End the bind phase. Later binds fail with [`EventError::Frozen`].
    pub fn freeze(&self) {
        let listeners = self.listeners.write();
        self.frozen.store(true, Ordering::Release);
        debug!(events = listeners.len(), "event bus frozen");
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Invoke every listener bound to the event's name and return the event.
    pub fn trigger<E: Dispatchable>(&self, mut event: E) -> Result<E, EventError> {
        self.dispatch(&mut event)?;
        Ok(event)
    }

    /// Invoke every listener bound to the event's name, in place.
    pub fn dispatch<E: Dispatchable>(&self, event: &mut E) -> Result<(), EventError> {
        let name = event.name().to_string();
        let _depth = DepthGuard::enter(self.id, &name, self.max_depth)?;

        // Listeners run without the lock held so they can trigger or bind.
        let listeners = self.snapshot(&name);
        if listeners.is_empty() {
            trace!(event = %name, "no listeners bound");
            return Ok(());
        }

        for (position, registration) in listeners.iter().enumerate() {
            let Some(listener) = registration.listener.downcast_ref::<Box<ListenerFn<E>>>()
            else {
                return Err(EventError::PayloadMismatch {
                    event: name,
                    expected: registration.accepts,
                    found: type_name::<E>(),
                });
            };

            if let Err(source) = listener(self, &mut *event) {
                warn!(
                    event = %name,
                    position,
                    error = %source,
                    "listener failed, aborting dispatch"
                );
                return Err(EventError::ListenerFailed {
                    event: name,
                    position,
                    source,
                });
            }
        }

        debug!(event = %name, listeners = listeners.len(), "dispatch complete");
        Ok(())
    }

    /// Check if any listener is bound to an event.
    pub fn has_listeners(&self, name: &str) -> bool {
        self.listeners
            .read()
            .get(name)
            .is_some_and(|bound| !bound.is_empty())
    }

    /// Number of listeners bound to an event.
    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.read().get(name).map(Vec::len).unwrap_or(0)
    }

    /// Names of all events with at least one listener, sorted.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.listeners.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn snapshot(&self, name: &str) -> Vec<Registration> {
        self.listeners.read().get(name).cloned().unwrap_or_default()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.listeners.read().len())
            .field("frozen", &self.is_frozen())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

thread_local! {
    /// Nesting depth of in-flight dispatches, keyed by bus id.
    static DISPATCH_DEPTH: RefCell<HashMap<u64, usize>> = RefCell::new(HashMap::new());
}

/// Tracks nested dispatch depth of one bus on the current thread.
struct DepthGuard {
    bus: u64,
}

impl DepthGuard {
    fn enter(bus: u64, event: &str, limit: Option<usize>) -> Result<Self, EventError> {
        DISPATCH_DEPTH.with(|depths| {
            let mut depths = depths.borrow_mut();
            let depth = depths.get(&bus).copied().unwrap_or(0) + 1;
            if let Some(limit) = limit {
                if depth > limit {
                    warn!(event = %event, limit, "dispatch depth limit exceeded");
                    return Err(EventError::DepthExceeded {
                        event: event.to_string(),
                        limit,
                    });
                }
            }
            depths.insert(bus, depth);
            Ok(Self { bus })
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DISPATCH_DEPTH.with(|depths| {
            let mut depths = depths.borrow_mut();
            match depths.get(&self.bus).copied() {
                Some(depth) if depth > 1 => {
                    depths.insert(self.bus, depth - 1);
                }
                _ => {
                    depths.remove(&self.bus);
                }
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::event::{CollectorEvent, Event};
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::error::Error as _;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn recorder(
        log: &Log,
        tag: &'static str,
    ) -> impl Fn(&EventBus, &mut Event) -> anyhow::Result<()> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |_, _| {
            log.lock().push(tag);
            Ok(())
        }
    }

    #[test]
    fn lower_priority_runs_first_regardless_of_bind_order() {
        for low_first in [true, false] {
            let bus = EventBus::new();
            let log: Log = Arc::default();

            if low_first {
                bus.bind_with_priority("ping", 5, recorder(&log, "p5")).unwrap();
                bus.bind_with_priority("ping", 10000, recorder(&log, "p10000")).unwrap();
            } else {
                bus.bind_with_priority("ping", 10000, recorder(&log, "p10000")).unwrap();
                bus.bind_with_priority("ping", 5, recorder(&log, "p5")).unwrap();
            }

            bus.trigger(Event::<Value>::new("ping")).unwrap();
            assert_eq!(*log.lock(), vec!["p5", "p10000"]);
        }
    }

    #[test]
    fn equal_priority_runs_in_registration_order() {
        let bus = EventBus::new();
        let log: Log = Arc::default();
        bus.bind("ping", recorder(&log, "first")).unwrap();
        bus.bind_with_priority("ping", 1, recorder(&log, "early")).unwrap();
        bus.bind("ping", recorder(&log, "second")).unwrap();

        bus.trigger(Event::<Value>::new("ping")).unwrap();
        assert_eq!(*log.lock(), vec!["early", "first", "second"]);
    }

    #[test]
    fn same_listener_bound_twice_runs_twice() {
        let bus = EventBus::new();
        let log: Log = Arc::default();
        let listener = Arc::new(recorder(&log, "hit"));
        for _ in 0..2 {
            let listener = Arc::clone(&listener);
            bus.bind("ping", move |bus: &EventBus, event: &mut Event| listener(bus, event))
                .unwrap();
        }

        bus.trigger(Event::<Value>::new("ping")).unwrap();
        assert_eq!(log.lock().len(), 2);
        assert_eq!(bus.listener_count("ping"), 2);
    }

    #[test]
    fn listeners_see_earlier_mutations() {
        let bus = EventBus::new();
        bus.bind_with_priority("count", 1, |_, event: &mut Event<u32>| {
            *event.data_mut() += 1;
            Ok(())
        })
        .unwrap();
        bus.bind_with_priority("count", 2, |_, event: &mut Event<u32>| {
            anyhow::ensure!(*event.data() == 1, "first listener did not run");
            *event.data_mut() *= 10;
            Ok(())
        })
        .unwrap();

        let event = bus.trigger(Event::with_data("count", 0u32)).unwrap();
        assert_eq!(event.into_data(), 10);
    }

    #[test]
    fn trigger_without_listeners_returns_event_unchanged() {
        let bus = EventBus::new();
        let event = bus
            .trigger(Event::with_data("nobody", Value::from(7)))
            .unwrap();
        assert_eq!(event.data(), &Value::from(7));
        assert!(!bus.has_listeners("nobody"));
    }

    #[test]
    fn failing_listener_stops_the_chain() {
        let bus = EventBus::new();
        let log: Log = Arc::default();
        bus.bind_with_priority("save", 1, recorder(&log, "before")).unwrap();
        bus.bind_with_priority("save", 2, |_, _: &mut Event| anyhow::bail!("store offline"))
            .unwrap();
        bus.bind_with_priority("save", 3, recorder(&log, "after")).unwrap();

        let err = bus.trigger(Event::<Value>::new("save")).unwrap_err();

        assert!(matches!(err, EventError::ListenerFailed { position: 1, .. }));
        assert_eq!(err.event(), "save");
        assert_eq!(err.source().unwrap().to_string(), "store offline");
        assert_eq!(*log.lock(), vec!["before"]);
    }

    #[test]
    fn listeners_may_trigger_nested_events() {
        let bus = EventBus::new();
        let log: Log = Arc::default();
        bus.bind("outer", |bus: &EventBus, _: &mut Event| {
            bus.trigger(Event::<Value>::new("inner"))?;
            Ok(())
        })
        .unwrap();
        bus.bind("inner", recorder(&log, "inner")).unwrap();

        bus.trigger(Event::<Value>::new("outer")).unwrap();
        assert_eq!(*log.lock(), vec!["inner"]);
    }

    #[test]
    fn listeners_may_retrigger_the_same_event() {
        let bus = EventBus::new();
        bus.bind("countdown", |bus: &EventBus, event: &mut Event<u32>| {
            if *event.data() > 0 {
                let next = bus.trigger(Event::with_data("countdown", event.data() - 1))?;
                *event.data_mut() += next.into_data() + 100;
            }
            Ok(())
        })
        .unwrap();

        let event = bus.trigger(Event::with_data("countdown", 2u32)).unwrap();
        // 0 -> 0, 1 -> 1 + 0 + 100, 2 -> 2 + 101 + 100
        assert_eq!(event.into_data(), 203);
    }

    #[test]
    fn binding_after_freeze_fails() {
        let bus = EventBus::new();
        let log: Log = Arc::default();
        bus.bind("ping", recorder(&log, "setup")).unwrap();
        bus.freeze();

        let err = bus.bind("ping", recorder(&log, "late")).unwrap_err();
        assert!(matches!(err, EventError::Frozen { .. }));
        assert!(bus.is_frozen());

        bus.trigger(Event::<Value>::new("ping")).unwrap();
        assert_eq!(*log.lock(), vec!["setup"]);
    }

    #[test]
    fn mismatched_event_type_is_reported() {
        let bus = EventBus::new();
        bus.bind("collect", |_, _: &mut Event| Ok(())).unwrap();

        let err = bus
            .trigger(CollectorEvent::<String>::new("collect"))
            .unwrap_err();
        assert!(matches!(err, EventError::PayloadMismatch { .. }));
    }

    #[test]
    fn depth_limit_stops_runaway_recursion() {
        let bus = EventBus::new().with_max_depth(3);
        bus.bind("loop", |bus: &EventBus, _: &mut Event| {
            bus.trigger(Event::<Value>::new("loop"))?;
            Ok(())
        })
        .unwrap();

        let err = bus.trigger(Event::<Value>::new("loop")).unwrap_err();

        let mut found = false;
        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&err);
        while let Some(e) = source {
            if let Some(EventError::DepthExceeded { limit, .. }) = e.downcast_ref::<EventError>() {
                assert_eq!(*limit, 3);
                found = true;
            }
            source = e.source();
        }
        assert!(found, "expected DepthExceeded in chain: {err:?}");

        // The guard unwinds, so a fresh trigger starts at depth 1 again.
        bus.trigger(Event::<Value>::new("unrelated")).unwrap();
    }

    #[test]
    fn event_names_are_sorted() {
        let bus = EventBus::new();
        bus.bind("b", |_, _: &mut Event| Ok(())).unwrap();
        bus.bind("a", |_, _: &mut Event| Ok(())).unwrap();
        assert_eq!(bus.event_names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn depth_is_counted_per_bus() {
        let inner = Arc::new(EventBus::new().with_max_depth(1));
        inner.bind("inner", |_, _: &mut Event| Ok(())).unwrap();

        let outer = EventBus::new().with_max_depth(1);
        {
            let inner = Arc::clone(&inner);
            outer
                .bind("outer", move |_, _: &mut Event| {
                    inner.trigger(Event::<Value>::new("inner"))?;
                    Ok(())
                })
                .unwrap();
        }

        outer.trigger(Event::<Value>::new("outer")).unwrap();
        inner.trigger(Event::<Value>::new("inner")).unwrap();
    }
}

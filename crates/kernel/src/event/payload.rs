//! Plain events: a name, read-mostly params and a mutable data payload.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Event params, set by whoever triggers the event.
pub type Params = serde_json::Map<String, Value>;

/// Anything the bus can dispatch.
///
/// Listeners are bound to a name and to the concrete event type they accept.
pub trait Dispatchable: Send + 'static {
    /// Name listeners are bound to.
    fn name(&self) -> &str;
}

/// An event with a typed data payload.
///
/// `D` defaults to JSON so ad-hoc module events can carry anything; the
/// content operations use typed payloads (e.g. `Event<InfoMap>`).
#[derive(Debug, Clone)]
pub struct Event<D = Value> {
    name: String,
    params: Params,
    data: D,
}

impl<D: Default> Event<D> {
    /// Create an event with empty params and default data.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_data(name, D::default())
    }
}

impl<D> Event<D> {
    /// Create an event with an initial data payload.
    pub fn with_data(name: impl Into<String>, data: D) -> Self {
        Self {
            name: name.into(),
            params: Params::new(),
            data,
        }
    }

    /// Add a param (builder style).
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Deserialize a param into `T`; `None` when absent or of another shape.
    pub fn param_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.params
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Read a boolean param, treating absence as `default`.
    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.params
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(key.into(), value.into());
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }

    pub fn set_data(&mut self, data: D) {
        self.data = data;
    }

    pub fn into_data(self) -> D {
        self.data
    }
}

impl<D: Send + 'static> Dispatchable for Event<D> {
    fn name(&self) -> &str {
        &self.name
    }
}

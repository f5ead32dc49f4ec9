//! Collector events accumulate contributions from every listener.
//!
//! Items are kept in the order listeners added them. There is no way to
//! remove or reorder an item once added, and duplicates are kept.

use serde_json::Value;

use super::payload::{Dispatchable, Params};

/// An event whose payload is the ordered list of listener contributions.
#[derive(Debug, Clone)]
pub struct CollectorEvent<T = Value> {
    name: String,
    params: Params,
    items: Vec<T>,
}

impl<T> CollectorEvent<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Params::new(),
            items: Vec::new(),
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

    /// Append a contribution.
    pub fn add(&mut self, item: T) {
        self.items.push(item);
    }

    /// Contributions so far, in invocation order.
    pub fn list(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_list(self) -> Vec<T> {
        self.items
    }
}

impl<T: Send + 'static> Dispatchable for CollectorEvent<T> {
    fn name(&self) -> &str {
        &self.name
    }
}

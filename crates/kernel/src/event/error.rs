//! Event bus error types.

use thiserror::Error;

/// Errors raised by binding to or triggering events.
///
/// Dispatch is fail-fast with no listener isolation: the first failing
/// listener aborts the rest of that trigger and its error surfaces here.
#[derive(Debug, Error)]
pub enum EventError {
    /// A listener returned an error.
    #[error("event '{event}': listener {position} failed")]
    ListenerFailed {
        event: String,
        /// Zero-based position of the listener in dispatch order.
        position: usize,
        #[source]
        source: anyhow::Error,
    },

    /// Binding was attempted after the bus entered its dispatch phase.
    #[error("event '{event}': cannot bind listener, the bus is frozen")]
    Frozen { event: String },

    /// The event was triggered with a different type than a listener accepts.
    #[error("event '{event}': listener accepts {expected}, triggered with {found}")]
    PayloadMismatch {
        event: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Nested dispatch went deeper than the configured limit.
    #[error("event '{event}': nested dispatch exceeded the depth limit of {limit}")]
    DepthExceeded { event: String, limit: usize },
}

impl EventError {
    /// Name of the event the error was raised for.
    pub fn event(&self) -> &str {
        match self {
            Self::ListenerFailed { event, .. }
            | Self::Frozen { event }
            | Self::PayloadMismatch { event, .. }
            | Self::DepthExceeded { event, .. } => event,
        }
    }
}

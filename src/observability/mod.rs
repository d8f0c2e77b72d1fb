//! Observability
//!
//! - Structured JSON logging, one line per event
//! - Typed events with fixed severities
//! - Counter-only commit metrics
//!
//! Observability never changes the outcome of a commit. Logging failures are
//! swallowed and metrics are plain counters.
//!
//! # Usage
//!
//! ```ignore
//! use commitgate::observability::{log_event, Event};
//!
//! log_event(Event::LockAcquired, &[("index", "trades")]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{CommitMetrics, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log `event` at its own severity.
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

//! # kb-observability
//!
//! Logging and metrics setup for Knowledge Warden.
//!
//! Structured logging goes through `tracing`; counters recorded with the
//! `metrics` macros are exported in Prometheus text format once
//! [`install_prometheus_recorder`] has run.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
pub use self::metrics::install_prometheus_recorder;

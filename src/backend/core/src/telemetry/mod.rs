//! Telemetry: structured logging and generation metrics.
//!
//! - **Logging**: `tracing` subscriber setup with JSON/pretty/compact output
//! - **Metrics**: the [`MetricsSink`] contract and its Prometheus implementation

pub mod logging;
pub mod metrics;

pub use self::logging::{build_filter, init_logging, LogFormat, LoggingConfig, LoggingError};
pub use self::metrics::{MetricsConfig, MetricsError, MetricsSink, PrometheusMetrics};

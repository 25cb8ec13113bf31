//! # Tollgate Telemetry
//!
//! Metrics and structured logging for the tollgate pipeline.
//!
//! - **Metrics**: a process-local [`ServiceMetrics`] handle holding the four
//!   service counters, mirrored to the `metrics` facade so any installed
//!   recorder sees the same values.
//! - **Logging**: structured logging via `tracing-subscriber`, configured by
//!   [`LogConfig`].
//!
//! # Standard Metrics
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `tollgate_requests_total` | Counter | Requests entering the pipeline |
//! | `tollgate_errors_total` | Counter | Requests that produced an error response |
//! | `tollgate_panics_total` | Counter | Panics contained by the pipeline |
//! | `tollgate_active_tasks` | Gauge | Runtime task count, sampled |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LoggingError};
pub use metrics::{MetricsSnapshot, ServiceMetrics};

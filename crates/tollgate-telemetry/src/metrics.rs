//! Service counters.
//!
//! [`ServiceMetrics`] is the single handle the pipeline stages increment.
//! Each update lands twice: in process-local atomics readable through
//! [`ServiceMetrics::snapshot`], and in the `metrics` facade so an installed
//! recorder exports the same series without the stages knowing about it.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge};
use serde::Serialize;

/// A point-in-time copy of the service counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Requests that entered the pipeline.
    pub requests: u64,
    /// Requests that produced an error response.
    pub errors: u64,
    /// Panics contained by the pipeline.
    pub panics: u64,
    /// Runtime task count at the last sample.
    pub tasks: u64,
}

/// The live counters for one service instance.
///
/// Cheap to share behind an `Arc`; all updates are relaxed atomics since the
/// counters are monotonic and never coordinate with other state.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    requests: AtomicU64,
    errors: AtomicU64,
    panics: AtomicU64,
    tasks: AtomicU64,
}

impl ServiceMetrics {
    /// Creates a zeroed handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a request entering the pipeline and returns the new total.
    ///
    /// The returned total lets the caller apply an every-Nth sampling policy
    /// without a separate counter.
    pub fn record_request(&self) -> u64 {
        counter!("tollgate_requests_total").increment(1);
        self.requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Counts a request that produced an error response.
    pub fn record_error(&self) {
        counter!("tollgate_errors_total").increment(1);
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a panic contained by the pipeline.
    pub fn record_panic(&self) {
        counter!("tollgate_panics_total").increment(1);
        self.panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Samples the runtime's alive task count into the task gauge.
    ///
    /// Outside a tokio runtime the gauge keeps its last value.
    pub fn sample_tasks(&self) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let alive = handle.metrics().num_alive_tasks() as u64;
            gauge!("tollgate_active_tasks").set(alive as f64);
            self.tasks.store(alive, Ordering::Relaxed);
        }
    }

    /// Returns a point-in-time copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
            tasks: self.tasks.load(Ordering::Relaxed),
        }
    }
}

//! Request counting middleware.
//!
//! Counts every request entering the pipeline and, every Nth request,
//! samples the runtime's alive task count into the task gauge. Error and
//! panic counters are owned by the stages that observe those events.

use std::sync::Arc;

use tollgate_core::{BoxFuture, Error};
use tollgate_telemetry::ServiceMetrics;

use crate::context::RequestState;
use crate::middleware::{Middleware, Next};
use crate::types::{Request, Response};

/// How often the task gauge is sampled, in requests.
pub const DEFAULT_SAMPLE_EVERY: u64 = 10;

/// Middleware that maintains the request counter and task gauge.
pub struct MetricsMiddleware {
    metrics: Arc<ServiceMetrics>,
    sample_every: u64,
}

impl MetricsMiddleware {
    /// Creates the metrics stage with the default sampling interval.
    #[must_use]
    pub fn new(metrics: Arc<ServiceMetrics>) -> Self {
        Self::with_sample_every(metrics, DEFAULT_SAMPLE_EVERY)
    }

    /// Creates the metrics stage sampling the task gauge every `n` requests.
    ///
    /// `n` of zero is treated as one.
    #[must_use]
    pub fn with_sample_every(metrics: Arc<ServiceMetrics>, n: u64) -> Self {
        Self {
            metrics,
            sample_every: n.max(1),
        }
    }
}

impl Middleware for MetricsMiddleware {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn process<'a>(
        &'a self,
        state: &'a mut RequestState,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(async move {
            let total = self.metrics.record_request();
            if total % self.sample_every == 0 {
                self.metrics.sample_tasks();
            }
            next.run(state, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use crate::types::ResponseExt;
    use http::StatusCode;

    fn empty_request() -> Request {
        http::Request::builder()
            .uri("/test")
            .body(http_body_util::Full::new(bytes::Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_every_request_is_counted() {
        let metrics = Arc::new(ServiceMetrics::new());
        let pipeline = Pipeline::builder()
            .stage(MetricsMiddleware::new(Arc::clone(&metrics)))
            .build();

        for _ in 0..3 {
            let mut state = RequestState::new(None);
            pipeline
                .process(&mut state, empty_request(), |_, _| {
                    Box::pin(async {
                        Ok(Response::json(StatusCode::OK, &serde_json::json!({})))
                    })
                })
                .await
                .unwrap();
        }

        assert_eq!(metrics.snapshot().requests, 3);
    }

    #[tokio::test]
    async fn test_sampling_every_request_updates_gauge() {
        let metrics = Arc::new(ServiceMetrics::new());
        let pipeline = Pipeline::builder()
            .stage(MetricsMiddleware::with_sample_every(
                Arc::clone(&metrics),
                1,
            ))
            .build();

        let guard = tokio::spawn(std::future::pending::<()>());
        let mut state = RequestState::new(None);
        pipeline
            .process(&mut state, empty_request(), |_, _| {
                Box::pin(async { Ok(Response::json(StatusCode::OK, &serde_json::json!({}))) })
            })
            .await
            .unwrap();
        guard.abort();

        assert!(metrics.snapshot().tasks >= 1);
    }
}

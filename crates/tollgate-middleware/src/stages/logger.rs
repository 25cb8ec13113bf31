//! Request logging middleware.
//!
//! The outermost stage. Emits one line when a request enters the pipeline
//! and one when it completes, both keyed by request id so the pair can be
//! correlated. The completion line carries the final status and elapsed
//! time, whether the request succeeded, failed, or is carrying the shutdown
//! signal out of the pipeline.

use tracing::info;

use tollgate_core::{BoxFuture, Error};

use crate::context::RequestState;
use crate::middleware::{Middleware, Next};
use crate::types::{Request, Response};

/// Middleware that logs request start and completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerMiddleware;

impl LoggerMiddleware {
    /// Creates the logger stage.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for LoggerMiddleware {
    fn name(&self) -> &'static str {
        "logger"
    }

    fn process<'a>(
        &'a self,
        state: &'a mut RequestState,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(async move {
            let method = request.method().clone();
            let path = request.uri().path().to_string();
            let request_id = state.request_id();

            info!(%request_id, %method, %path, "request started");

            let result = next.run(state, request).await;

            let elapsed = state.started_at().elapsed();
            match &result {
                Ok(response) => {
                    state.set_status(response.status());
                    info!(
                        %request_id,
                        %method,
                        %path,
                        status = response.status().as_u16(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "request completed",
                    );
                }
                Err(err) => {
                    info!(
                        %request_id,
                        %method,
                        %path,
                        error = %err,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "request completed",
                    );
                }
            }

            result
        })
    }
}

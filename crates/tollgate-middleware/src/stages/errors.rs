//! Error translation middleware.
//!
//! The single point where classified errors become responses. Sits directly
//! inside the logger so everything below it, business handlers included, can
//! return `Err` freely and still produce a well-formed client envelope.
//!
//! Two behaviors matter here:
//!
//! - The full error chain is logged server-side at error level. The client
//!   sees only the redaction-aware message and status from the code table.
//! - The graceful-shutdown signal is not an error to translate. It passes
//!   through untouched so the transport's accept loop can act on it.

use std::sync::Arc;

use tracing::error;

use tollgate_core::{BoxFuture, Error};
use tollgate_telemetry::ServiceMetrics;

use crate::context::RequestState;
use crate::middleware::{Middleware, Next};
use crate::types::{Request, Response, ResponseExt};

/// Middleware that converts downstream errors into responses.
pub struct ErrorsMiddleware {
    metrics: Arc<ServiceMetrics>,
}

impl ErrorsMiddleware {
    /// Creates the error translation stage.
    #[must_use]
    pub fn new(metrics: Arc<ServiceMetrics>) -> Self {
        Self { metrics }
    }
}

impl Middleware for ErrorsMiddleware {
    fn name(&self) -> &'static str {
        "errors"
    }

    fn process<'a>(
        &'a self,
        state: &'a mut RequestState,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(async move {
            match next.run(state, request).await {
                Ok(response) => Ok(response),
                Err(Error::Shutdown(reason)) => Err(Error::Shutdown(reason)),
                Err(Error::App(app)) => {
                    self.metrics.record_error();
                    error!(
                        request_id = %state.request_id(),
                        code = %app.code(),
                        error = %app,
                        source = ?std::error::Error::source(&app),
                        "request error",
                    );
                    Ok(Response::app_error(&app))
                }
            }
        })
    }
}

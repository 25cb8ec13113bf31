//! Panic containment middleware.
//!
//! The innermost ambient stage. A panic anywhere downstream, business
//! handler included, is caught here, counted, and converted into an
//! `Internal` error so one misbehaving request cannot take out its worker.
//! The panic payload and a captured backtrace go to the logs through the
//! error stage; the client sees only the generic internal envelope.

use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use tollgate_core::{AppError, BoxFuture, ErrCode, Error};
use tollgate_telemetry::ServiceMetrics;

use crate::context::RequestState;
use crate::middleware::{Middleware, Next};
use crate::types::{Request, Response};

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Middleware that contains downstream panics.
pub struct PanicsMiddleware {
    metrics: Arc<ServiceMetrics>,
}

impl PanicsMiddleware {
    /// Creates the panic containment stage.
    #[must_use]
    pub fn new(metrics: Arc<ServiceMetrics>) -> Self {
        Self { metrics }
    }
}

impl Middleware for PanicsMiddleware {
    fn name(&self) -> &'static str {
        "panics"
    }

    fn process<'a>(
        &'a self,
        state: &'a mut RequestState,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(async move {
            match AssertUnwindSafe(next.run(state, request)).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    self.metrics.record_panic();
                    let message = panic_message(payload.as_ref());
                    let trace = Backtrace::force_capture();
                    Err(Error::from(AppError::new(
                        ErrCode::Internal,
                        anyhow::anyhow!("panic: {message}\n{trace}"),
                    )))
                }
            }
        })
    }
}

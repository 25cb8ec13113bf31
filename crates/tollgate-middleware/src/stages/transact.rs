//! Transaction lifecycle middleware.
//!
//! The innermost stage on routes that write. Begins a transaction before the
//! handler, parks it on the request state, and finalizes it from the
//! handler's outcome: commit on success, rollback on error. A panic unwinding
//! out of the handler rolls the transaction back first and is then re-raised
//! so the panic guard above still observes it.
//!
//! Beginning the transaction honors the request deadline; rollback does not,
//! since abandoning a rollback leaks the transaction.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::warn;

use tollgate_core::store::{Beginner, StoreError, Transaction};
use tollgate_core::{AppError, BoxFuture, ErrCode, Error};

use crate::context::RequestState;
use crate::middleware::{Middleware, Next};
use crate::types::{Request, Response};

/// Middleware that scopes its route in a transaction.
pub struct TransactMiddleware {
    beginner: Arc<dyn Beginner>,
}

impl TransactMiddleware {
    /// Creates the transaction stage.
    #[must_use]
    pub fn new(beginner: Arc<dyn Beginner>) -> Self {
        Self { beginner }
    }

    async fn begin(
        &self,
        state: &RequestState,
    ) -> Result<Arc<dyn Transaction>, AppError> {
        let begin = self.beginner.begin();
        let result = match state.deadline() {
            Some(at) => tokio::time::timeout_at(at, begin).await.map_err(|_| {
                AppError::msg(ErrCode::DeadlineExceeded, "request deadline exceeded")
            })?,
            None => begin.await,
        };

        result.map_err(|e| match e {
            StoreError::Canceled => AppError::msg(ErrCode::Canceled, "request canceled"),
            StoreError::DeadlineExceeded => {
                AppError::msg(ErrCode::DeadlineExceeded, "request deadline exceeded")
            }
            other => AppError::new(ErrCode::Internal, anyhow::Error::from(other)),
        })
    }
}

/// Rolls back, tolerating a transaction some downstream code already
/// finalized.
async fn rollback_quietly(tx: &Arc<dyn Transaction>) {
    match tx.rollback().await {
        Ok(()) | Err(StoreError::Finalized) => {}
        Err(e) => warn!(error = %e, "rollback failed"),
    }
}

impl Middleware for TransactMiddleware {
    fn name(&self) -> &'static str {
        "transact"
    }

    fn process<'a>(
        &'a self,
        state: &'a mut RequestState,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(async move {
            let tx = self.begin(state).await?;
            state.set_transaction(Arc::clone(&tx));

            let outcome = AssertUnwindSafe(next.run(&mut *state, request))
                .catch_unwind()
                .await;

            // Reclaim the slot whatever happened downstream.
            let tx = state.take_transaction().unwrap_or(tx);

            match outcome {
                Err(payload) => {
                    rollback_quietly(&tx).await;
                    std::panic::resume_unwind(payload);
                }
                Ok(Err(err)) => {
                    rollback_quietly(&tx).await;
                    Err(err)
                }
                Ok(Ok(response)) => {
                    match tx.commit().await {
                        // A handler that committed explicitly is fine.
                        Ok(()) | Err(StoreError::Finalized) => Ok(response),
                        Err(e) => Err(Error::from(AppError::new(
                            ErrCode::Internal,
                            anyhow::Error::from(e),
                        ))),
                    }
                }
            }
        })
    }
}

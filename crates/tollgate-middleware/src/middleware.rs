//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait that all pipeline stages
//! implement, and [`Next`], the consumable handle a stage uses to invoke its
//! successor.
//!
//! # Example
//!
//! ```ignore
//! use tollgate_middleware::{Middleware, Next, Request, Response, BoxFuture};
//! use tollgate_middleware::context::RequestState;
//! use tollgate_core::Error;
//!
//! struct TimingMiddleware;
//!
//! impl Middleware for TimingMiddleware {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         state: &'a mut RequestState,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Result<Response, Error>> {
//!         Box::pin(async move {
//!             let start = std::time::Instant::now();
//!             let result = next.run(state, request).await;
//!             tracing::debug!(elapsed = ?start.elapsed(), "stage timing");
//!             result
//!         })
//!     }
//! }
//! ```

use tollgate_core::{BoxFuture, Error};

use crate::context::RequestState;
use crate::types::{Request, Response};

/// The core middleware trait.
///
/// Stages receive mutable per-request state, the incoming request, and a
/// [`Next`] handle to invoke the rest of the chain.
///
/// # Invariants
///
/// - A stage either calls `next.run()` exactly once or short-circuits with
///   its own result; [`Next`] is consumed by `run`, so calling twice does
///   not compile
/// - A stage must not swallow the shutdown signal from downstream
pub trait Middleware: Send + Sync + 'static {
    /// Returns the unique name of this stage, used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request through this stage.
    fn process<'a>(
        &'a self,
        state: &'a mut RequestState,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Error>>;
}

/// The type of the terminal handler at the end of the chain.
pub type Handler<'a> = Box<
    dyn FnOnce(&mut RequestState, Request) -> BoxFuture<'static, Result<Response, Error>>
        + Send
        + 'a,
>;

/// Handle to the remainder of the chain.
///
/// Passed to each stage; consumed by [`Next::run`] so it can be invoked at
/// most once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    /// More stages to process.
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    /// End of chain, invoke the handler.
    Handler(Handler<'a>),
}

impl<'a> Next<'a> {
    /// Creates a `Next` that will invoke the given stage.
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` that invokes the handler.
    pub(crate) fn handler<F>(f: F) -> Self
    where
        F: FnOnce(&mut RequestState, Request) -> BoxFuture<'static, Result<Response, Error>>
            + Send
            + 'a,
    {
        Self {
            inner: NextInner::Handler(Box::new(f)),
        }
    }

    /// Invokes the rest of the chain.
    ///
    /// Consumes `self` so it can only be called once.
    pub async fn run(self, state: &mut RequestState, request: Request) -> Result<Response, Error> {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(state, request, *next).await,
            NextInner::Handler(handler) => handler(state, request).await,
        }
    }
}

/// A middleware built from an async function.
///
/// Lets tests and small integrations define a stage without a dedicated
/// type.
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(
            &'a mut RequestState,
            Request,
            Next<'a>,
        ) -> BoxFuture<'a, Result<Response, Error>>
        + Send
        + Sync
        + 'static,
{
    /// Creates a new function-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(
            &'a mut RequestState,
            Request,
            Next<'a>,
        ) -> BoxFuture<'a, Result<Response, Error>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        state: &'a mut RequestState,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Error>> {
        (self.func)(state, request, next)
    }
}

//! Middleware composition.
//!
//! A [`Pipeline`] is an ordered list of stages composed around a terminal
//! handler. Composition folds from the innermost stage outward, so the first
//! stage added is the first to see the request and the last to see the
//! response.
//!
//! Optional stages are added with [`PipelineBuilder::maybe_stage`]: a route
//! without authentication simply passes `None` and the chain closes over the
//! gap with no placeholder stage.

use std::sync::Arc;

use tollgate_core::{BoxFuture, Error};

use crate::context::RequestState;
use crate::middleware::{Middleware, Next};
use crate::types::{Request, Response};

/// A type-erased stage that can be stored in a pipeline.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// An ordered, immutable middleware chain.
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::builder()
///     .stage(LoggerMiddleware::new())
///     .maybe_stage(auth_stage)   // Option<AuthenMiddleware>
///     .build();
///
/// let response = pipeline
///     .process(&mut state, request, |_, _| Box::pin(async { Ok(response) }))
///     .await?;
/// ```
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Processes a request through every stage and the handler.
    ///
    /// The only `Err` that escapes a fully-assembled pipeline is the
    /// graceful-shutdown signal; everything else is translated into a
    /// response by the error stage.
    pub async fn process<H>(
        &self,
        state: &mut RequestState,
        request: Request,
        handler: H,
    ) -> Result<Response, Error>
    where
        H: FnOnce(&mut RequestState, Request) -> BoxFuture<'static, Result<Response, Error>>
            + Send
            + 'static,
    {
        let next = self.build_chain(handler);
        next.run(state, request).await
    }

    /// Builds the chain for one request, innermost first.
    fn build_chain<'a, H>(&'a self, handler: H) -> Next<'a>
    where
        H: FnOnce(&mut RequestState, Request) -> BoxFuture<'static, Result<Response, Error>>
            + Send
            + 'a,
    {
        let mut next = Next::handler(handler);
        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Returns the names of all stages in request order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|m| m.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// Builder for a [`Pipeline`].
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Appends a stage. Requests visit stages in the order they were added.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared stage.
    #[must_use]
    pub fn stage_arc(mut self, middleware: BoxedMiddleware) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Appends a stage when present, or nothing at all.
    ///
    /// `None` leaves no trace in the chain: no placeholder, no overhead.
    #[must_use]
    pub fn maybe_stage<M: Middleware>(self, middleware: Option<M>) -> Self {
        match middleware {
            Some(m) => self.stage(m),
            None => self,
        }
    }

    /// Finalizes the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

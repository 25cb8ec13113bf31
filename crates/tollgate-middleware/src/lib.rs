//! # Tollgate Middleware
//!
//! The fixed-order request pipeline for tollgate services.
//!
//! Every request flows through the same stages in the same order before it
//! reaches the business handler, and back out through them afterwards:
//!
//! ```text
//! Request → Logger → Errors → Metrics → Panics → Authen → Authorize → Transact → Handler
//!                                                                                   ↓
//! Response ←───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Stage     | Purpose                                                    |
//! |-----------|------------------------------------------------------------|
//! | Logger    | Request start/completion lines with id, path, status       |
//! | Errors    | Translate classified errors into responses, count them     |
//! | Metrics   | Count requests, sample the runtime task gauge              |
//! | Panics    | Contain handler panics, convert to internal errors         |
//! | Authen    | Verify Bearer or Basic credentials into [`Claims`]         |
//! | Authorize | Evaluate the route's rule against claims and ownership     |
//! | Transact  | Begin a transaction, commit on success, roll back on error |
//!
//! The first four stages are ambient and wrap every route. The last three are
//! per-route: a public route omits authentication, a read-only route omits
//! the transaction.
//!
//! ## Key Properties
//!
//! - **Fixed Order**: stages compose outermost-first; the composer skips
//!   absent optional stages without leaving a hole
//! - **Consumable Next**: a stage can invoke its successor at most once
//! - **Typed Errors**: stages return `Result<Response, Error>` and only the
//!   graceful-shutdown signal escapes the pipeline as `Err`
//!
//! [`Claims`]: tollgate_core::Claims

#![doc(html_root_url = "https://docs.rs/tollgate-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod middleware;
pub mod pipeline;
pub mod stages;
pub mod types;

pub use context::{Entity, RequestState};
pub use middleware::{FnMiddleware, Middleware, Next};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use types::{Request, Response, ResponseExt};

pub use tollgate_core::BoxFuture;

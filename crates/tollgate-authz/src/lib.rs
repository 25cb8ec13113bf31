//! # Tollgate Authorization
//!
//! Rule-based authorization decisions for the tollgate pipeline.
//!
//! # Overview
//!
//! Authorization is a pure decision over three inputs: the caller's verified
//! [`Claims`](tollgate_core::Claims), the named [`Rule`] the route demands,
//! and an optional target subject id resolved from the entity the request
//! addresses. The decision produces no data, only allow or deny.
//!
//! # Architecture
//!
//! ```text
//!     Claims ──┐
//!              │      ┌─────────────────────┐
//!     Rule ────┼─────▶│  PolicyEvaluator    │────▶ allow / AuthzError
//!              │      │  (RoleEvaluator)    │
//!     target ──┘      └─────────────────────┘
//! ```
//!
//! [`PolicyEvaluator`] is the seam: the built-in [`RoleEvaluator`] decides
//! from roles and ownership alone, and callers can substitute an evaluator
//! backed by an external policy engine without touching the pipeline.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod evaluator;
pub mod query;
pub mod rule;

// Re-exports for convenience
pub use error::{AuthzError, AuthzResult};
pub use evaluator::{PolicyEvaluator, RoleEvaluator};
pub use query::AuthorizationQuery;
pub use rule::Rule;

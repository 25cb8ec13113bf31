//! Pipeline stage implementations.
//!
//! ## Ambient Stages
//!
//! Wrap every route, outermost first:
//!
//! 1. [`logger`] - request start/completion lines
//! 2. [`errors`] - error translation and counting
//! 3. [`metrics`] - request counting and task sampling
//! 4. [`panics`] - panic containment
//!
//! ## Route Stages
//!
//! Present only where the route needs them:
//!
//! 5. [`authen`] - credential verification
//! 6. [`authorize`] - rule evaluation
//! 7. [`transact`] - transaction lifecycle

pub mod authen;
pub mod authorize;
pub mod errors;
pub mod logger;
pub mod metrics;
pub mod panics;
pub mod transact;

// Re-export main types
pub use authen::{AuthenMiddleware, Authenticator, Credential, KeyResolver, LocalAuthenticator, StaticKeys};
pub use authorize::{AuthorizeMiddleware, EntityLoader, HomeLoader, ProductLoader, UserLoader};
pub use errors::ErrorsMiddleware;
pub use logger::LoggerMiddleware;
pub use metrics::MetricsMiddleware;
pub use panics::PanicsMiddleware;
pub use transact::TransactMiddleware;

//! # Tollgate
//!
//! A fixed-order request middleware pipeline with authentication,
//! authorization, and transaction scoping.
//!
//! Tollgate sits between a transport and business handlers. Every request
//! flows through the same ambient stages, and each route opts into the
//! identity and transaction stages it needs:
//!
//! ```text
//! Request → Logger → Errors → Metrics → Panics → [Authen → Authorize → Transact] → Handler
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tollgate::prelude::*;
//!
//! let gateway = Gateway::builder()
//!     .authenticator(authenticator)
//!     .database(db)
//!     .users(users)
//!     .build();
//!
//! // One route: GET /products/{id}, owner or admin only.
//! let route = gateway.handler(Some(Rule::AdminOrSubject), EntityKind::Product, false);
//! let response = route.call(Some(product_id), request, my_handler).await?;
//! ```
//!
//! The crates underneath are re-exported whole for callers that need the
//! pieces directly.

#![doc(html_root_url = "https://docs.rs/tollgate/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod gateway;

pub use gateway::{EffectiveHandler, EntityKind, Gateway, GatewayBuilder, GatewayError};

// Re-export component crates
pub use tollgate_authz as authz;
pub use tollgate_core as core;
pub use tollgate_middleware as middleware;
pub use tollgate_telemetry as telemetry;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::gateway::{EffectiveHandler, EntityKind, Gateway, GatewayBuilder, GatewayError};
    pub use tollgate_authz::{Rule, RoleEvaluator};
    pub use tollgate_core::{AppError, Claims, ErrCode, Error, FieldError, RequestId, Role};
    pub use tollgate_middleware::stages::authen::{
        issue_token, Authenticator, LocalAuthenticator, StaticKeys,
    };
    pub use tollgate_middleware::{Request, Response, ResponseExt};
    pub use tollgate_telemetry::{init_logging, LogConfig, ServiceMetrics};
}

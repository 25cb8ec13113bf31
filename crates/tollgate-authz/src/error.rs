//! Error types for the authorization crate.

use thiserror::Error;

use crate::rule::Rule;

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Errors that can occur during authorization.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthzError {
    /// The policy denied the request.
    #[error("rule {rule} denied the request")]
    Denied {
        /// The rule that was evaluated.
        rule: Rule,
    },

    /// The evaluator itself failed.
    #[error("policy evaluation failed: {0}")]
    Evaluation(String),
}

impl AuthzError {
    /// Creates a denial for the given rule.
    #[must_use]
    pub const fn denied(rule: Rule) -> Self {
        Self::Denied { rule }
    }
}

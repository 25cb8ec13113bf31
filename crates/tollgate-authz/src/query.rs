//! The input to a policy decision.

use serde::Serialize;
use uuid::Uuid;

use tollgate_core::Claims;

use crate::rule::Rule;

/// Everything an evaluator may consider for one decision.
///
/// Serializable so an external policy engine can receive it as a document;
/// the built-in evaluator reads the fields directly.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationQuery {
    /// The caller's verified identity.
    pub claims: Claims,
    /// The rule the route demands.
    pub rule: Rule,
    /// Owner of the entity the request targets, when the rule compares
    /// ownership and the route carries an entity id.
    pub target_subject: Option<Uuid>,
}

impl AuthorizationQuery {
    /// Builds a query with no target entity.
    #[must_use]
    pub fn new(claims: Claims, rule: Rule) -> Self {
        Self {
            claims,
            rule,
            target_subject: None,
        }
    }

    /// Sets the owner of the targeted entity.
    #[must_use]
    pub fn with_target(mut self, subject: Uuid) -> Self {
        self.target_subject = Some(subject);
        self
    }
}

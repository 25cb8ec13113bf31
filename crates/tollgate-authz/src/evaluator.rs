//! Policy evaluation.

use tracing::debug;

use tollgate_core::BoxFuture;

use crate::error::{AuthzError, AuthzResult};
use crate::query::AuthorizationQuery;

/// Decides whether a request may proceed.
///
/// The evaluator is async so implementations may consult an external policy
/// service; the built-in [`RoleEvaluator`] resolves immediately.
pub trait PolicyEvaluator: Send + Sync {
    /// Evaluates the query, returning `Ok(())` to allow.
    fn evaluate<'a>(&'a self, query: &'a AuthorizationQuery) -> BoxFuture<'a, AuthzResult<()>>;
}

/// The built-in evaluator.
///
/// A caller passes when they hold one of the rule's required roles, or, for
/// [`Rule::AdminOrSubject`], when their subject id matches the target
/// entity's owner.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleEvaluator;

impl RoleEvaluator {
    /// Creates the evaluator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn decide(query: &AuthorizationQuery) -> AuthzResult<()> {
        if query.claims.authorized(query.rule.required_roles()) {
            return Ok(());
        }

        if query.rule.wants_target() {
            if let Some(target) = query.target_subject {
                if query.claims.subject() == target {
                    return Ok(());
                }
            }
        }

        Err(AuthzError::denied(query.rule))
    }
}

impl PolicyEvaluator for RoleEvaluator {
    fn evaluate<'a>(&'a self, query: &'a AuthorizationQuery) -> BoxFuture<'a, AuthzResult<()>> {
        Box::pin(async move {
            let decision = Self::decide(query);
            debug!(
                rule = %query.rule,
                subject = %query.claims.subject(),
                allowed = decision.is_ok(),
                "policy decision",
            );
            decision
        })
    }
}

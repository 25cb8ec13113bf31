//! Route pipeline assembly.
//!
//! [`Gateway`] holds the shared collaborators and stamps out one
//! [`EffectiveHandler`] per route. The ambient stages are always present and
//! always in the same order; the identity and transaction stages appear only
//! when the route asks for them.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use tollgate_authz::{PolicyEvaluator, RoleEvaluator, Rule};
use tollgate_core::store::{Beginner, HomeLookup, ProductLookup, UserLookup};
use tollgate_core::{BoxFuture, Error};
use tollgate_middleware::context::RequestState;
use tollgate_middleware::stages::authorize::{EntityLoader, HomeLoader, ProductLoader, UserLoader};
use tollgate_middleware::stages::{
    AuthenMiddleware, Authenticator, AuthorizeMiddleware, ErrorsMiddleware, LoggerMiddleware,
    MetricsMiddleware, PanicsMiddleware, TransactMiddleware,
};
use tollgate_middleware::{Pipeline, Request, Response};
use tollgate_telemetry::ServiceMetrics;

/// The entity family a route addresses, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// The route has no entity id.
    None,
    /// The route addresses a user.
    User,
    /// The route addresses a product.
    Product,
    /// The route addresses a home.
    Home,
}

/// Errors from route assembly.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The route demands a rule but no authenticator is configured.
    #[error("route requires authentication but no authenticator is configured")]
    MissingAuthenticator,

    /// The route addresses an entity family with no configured lookup.
    #[error("route targets {0} entities but no {0} lookup is configured")]
    MissingLookup(&'static str),

    /// The route is transactional but no database is configured.
    #[error("transactional route requires a database")]
    MissingDatabase,
}

/// Shared collaborators for every route of one service.
pub struct Gateway {
    metrics: Arc<ServiceMetrics>,
    policy: Arc<dyn PolicyEvaluator>,
    authenticator: Option<Arc<dyn Authenticator>>,
    database: Option<Arc<dyn Beginner>>,
    users: Option<Arc<dyn UserLookup>>,
    products: Option<Arc<dyn ProductLookup>>,
    homes: Option<Arc<dyn HomeLookup>>,
    timeout: Option<Duration>,
}

impl Gateway {
    /// Creates a new gateway builder.
    #[must_use]
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Returns the service metrics handle.
    #[must_use]
    pub fn metrics(&self) -> Arc<ServiceMetrics> {
        Arc::clone(&self.metrics)
    }

    fn loader(&self, entity: EntityKind) -> Result<Option<Arc<dyn EntityLoader>>, GatewayError> {
        match entity {
            EntityKind::None => Ok(None),
            EntityKind::User => self
                .users
                .as_ref()
                .map(|u| Arc::new(UserLoader(Arc::clone(u))) as Arc<dyn EntityLoader>)
                .map(Some)
                .ok_or(GatewayError::MissingLookup("user")),
            EntityKind::Product => self
                .products
                .as_ref()
                .map(|p| Arc::new(ProductLoader(Arc::clone(p))) as Arc<dyn EntityLoader>)
                .map(Some)
                .ok_or(GatewayError::MissingLookup("product")),
            EntityKind::Home => self
                .homes
                .as_ref()
                .map(|h| Arc::new(HomeLoader(Arc::clone(h))) as Arc<dyn EntityLoader>)
                .map(Some)
                .ok_or(GatewayError::MissingLookup("home")),
        }
    }

    /// Assembles the pipeline for one route.
    ///
    /// `rule` of `None` makes the route public: no authentication, no
    /// authorization. `transactional` wraps the handler in a transaction.
    pub fn handler(
        &self,
        rule: Option<Rule>,
        entity: EntityKind,
        transactional: bool,
    ) -> Result<EffectiveHandler, GatewayError> {
        let mut builder = Pipeline::builder()
            .stage(LoggerMiddleware::new())
            .stage(ErrorsMiddleware::new(Arc::clone(&self.metrics)))
            .stage(MetricsMiddleware::new(Arc::clone(&self.metrics)))
            .stage(PanicsMiddleware::new(Arc::clone(&self.metrics)));

        if let Some(rule) = rule {
            let authenticator = self
                .authenticator
                .as_ref()
                .ok_or(GatewayError::MissingAuthenticator)?;
            builder = builder.stage(AuthenMiddleware::new(Arc::clone(authenticator)));

            builder = match self.loader(entity)? {
                Some(loader) => builder.stage(AuthorizeMiddleware::with_loader(
                    Arc::clone(&self.policy),
                    rule,
                    loader,
                )),
                None => builder.stage(AuthorizeMiddleware::new(Arc::clone(&self.policy), rule)),
            };
        }

        if transactional {
            let database = self.database.as_ref().ok_or(GatewayError::MissingDatabase)?;
            builder = builder.stage(TransactMiddleware::new(Arc::clone(database)));
        }

        Ok(EffectiveHandler {
            pipeline: Arc::new(builder.build()),
            timeout: self.timeout,
        })
    }
}

/// Builder for a [`Gateway`].
pub struct GatewayBuilder {
    metrics: Option<Arc<ServiceMetrics>>,
    policy: Option<Arc<dyn PolicyEvaluator>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    database: Option<Arc<dyn Beginner>>,
    users: Option<Arc<dyn UserLookup>>,
    products: Option<Arc<dyn ProductLookup>>,
    homes: Option<Arc<dyn HomeLookup>>,
    timeout: Option<Duration>,
}

impl GatewayBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metrics: None,
            policy: None,
            authenticator: None,
            database: None,
            users: None,
            products: None,
            homes: None,
            timeout: None,
        }
    }

    /// Sets the metrics handle. A fresh one is created when absent.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<ServiceMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sets the policy evaluator. Defaults to the role evaluator.
    #[must_use]
    pub fn policy(mut self, policy: Arc<dyn PolicyEvaluator>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Sets the authenticator used by authenticated routes.
    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Sets the database used by transactional routes.
    #[must_use]
    pub fn database(mut self, database: Arc<dyn Beginner>) -> Self {
        self.database = Some(database);
        self
    }

    /// Sets the user lookup.
    #[must_use]
    pub fn users(mut self, users: Arc<dyn UserLookup>) -> Self {
        self.users = Some(users);
        self
    }

    /// Sets the product lookup.
    #[must_use]
    pub fn products(mut self, products: Arc<dyn ProductLookup>) -> Self {
        self.products = Some(products);
        self
    }

    /// Sets the home lookup.
    #[must_use]
    pub fn homes(mut self, homes: Arc<dyn HomeLookup>) -> Self {
        self.homes = Some(homes);
        self
    }

    /// Sets the per-request timeout. No deadline when absent.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Finalizes the gateway.
    #[must_use]
    pub fn build(self) -> Gateway {
        Gateway {
            metrics: self.metrics.unwrap_or_default(),
            policy: self
                .policy
                .unwrap_or_else(|| Arc::new(RoleEvaluator::new())),
            authenticator: self.authenticator,
            database: self.database,
            users: self.users,
            products: self.products,
            homes: self.homes,
            timeout: self.timeout,
        }
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One route's assembled pipeline.
#[derive(Clone)]
pub struct EffectiveHandler {
    pipeline: Arc<Pipeline>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for EffectiveHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectiveHandler")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl EffectiveHandler {
    /// Runs one request through the route.
    ///
    /// `entity_id` is the raw id path segment for entity routes. The only
    /// `Err` this returns is the graceful-shutdown signal.
    pub async fn call<H>(
        &self,
        entity_id: Option<String>,
        request: Request,
        handler: H,
    ) -> Result<Response, Error>
    where
        H: FnOnce(&mut RequestState, Request) -> BoxFuture<'static, Result<Response, Error>>
            + Send
            + 'static,
    {
        let mut state = RequestState::new(self.timeout);
        if let Some(id) = entity_id {
            state = state.with_entity_id(id);
        }
        self.pipeline.process(&mut state, request, handler).await
    }

    /// Returns the stage names of this route's pipeline, in request order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.pipeline.stage_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_route_has_only_ambient_stages() {
        let gateway = Gateway::builder().build();
        let route = gateway.handler(None, EntityKind::None, false).unwrap();
        assert_eq!(
            route.stage_names(),
            vec!["logger", "errors", "metrics", "panics"]
        );
    }

    #[test]
    fn test_authenticated_route_requires_authenticator() {
        let gateway = Gateway::builder().build();
        let err = gateway
            .handler(Some(Rule::Any), EntityKind::None, false)
            .unwrap_err();
        assert!(matches!(err, GatewayError::MissingAuthenticator));
    }

    #[test]
    fn test_transactional_route_requires_database() {
        let gateway = Gateway::builder().build();
        let err = gateway.handler(None, EntityKind::None, true).unwrap_err();
        assert!(matches!(err, GatewayError::MissingDatabase));
    }
}

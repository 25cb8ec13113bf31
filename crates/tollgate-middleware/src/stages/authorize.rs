//! Authorization middleware.
//!
//! Evaluates the route's rule against the caller's claims and, for routes
//! addressing a single entity, the entity's owner. The entity is loaded
//! here once and parked on the request state so the handler does not fetch
//! it again.
//!
//! Denials and lookup failures alike surface as `Unauthenticated`: a caller
//! probing ids they do not own learns nothing about which ids exist.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use tollgate_authz::{AuthorizationQuery, AuthzError, PolicyEvaluator, Rule};
use tollgate_core::store::{HomeLookup, ProductLookup, StoreError, UserLookup};
use tollgate_core::{AppError, BoxFuture, ErrCode, Error};

use crate::context::{Entity, RequestState};
use crate::middleware::{Middleware, Next};
use crate::types::{Request, Response};

/// Resolves a route's entity id into the entity and its owning subject.
pub trait EntityLoader: Send + Sync {
    /// Returns the entity kind name, used in logs.
    fn kind(&self) -> &'static str;

    /// Loads the entity for the given id.
    fn load(&self, id: Uuid) -> BoxFuture<'_, Result<(Entity, Uuid), StoreError>>;
}

/// Loads users; the target subject is the user itself.
pub struct UserLoader(pub Arc<dyn UserLookup>);

impl EntityLoader for UserLoader {
    fn kind(&self) -> &'static str {
        "user"
    }

    fn load(&self, id: Uuid) -> BoxFuture<'_, Result<(Entity, Uuid), StoreError>> {
        Box::pin(async move {
            let user = self.0.by_id(id).await?;
            let subject = user.id;
            Ok((Entity::User(user), subject))
        })
    }
}

/// Loads products; the target subject is the product's owner.
pub struct ProductLoader(pub Arc<dyn ProductLookup>);

impl EntityLoader for ProductLoader {
    fn kind(&self) -> &'static str {
        "product"
    }

    fn load(&self, id: Uuid) -> BoxFuture<'_, Result<(Entity, Uuid), StoreError>> {
        Box::pin(async move {
            let product = self.0.by_id(id).await?;
            let subject = product.owner_id;
            Ok((Entity::Product(product), subject))
        })
    }
}

/// Loads homes; the target subject is the home's owner.
pub struct HomeLoader(pub Arc<dyn HomeLookup>);

impl EntityLoader for HomeLoader {
    fn kind(&self) -> &'static str {
        "home"
    }

    fn load(&self, id: Uuid) -> BoxFuture<'_, Result<(Entity, Uuid), StoreError>> {
        Box::pin(async move {
            let home = self.0.by_id(id).await?;
            let subject = home.owner_id;
            Ok((Entity::Home(home), subject))
        })
    }
}

/// Middleware that enforces one rule on its route.
pub struct AuthorizeMiddleware {
    policy: Arc<dyn PolicyEvaluator>,
    rule: Rule,
    loader: Option<Arc<dyn EntityLoader>>,
}

impl AuthorizeMiddleware {
    /// Creates an authorization stage for a route without an entity id.
    #[must_use]
    pub fn new(policy: Arc<dyn PolicyEvaluator>, rule: Rule) -> Self {
        Self {
            policy,
            rule,
            loader: None,
        }
    }

    /// Creates an authorization stage that resolves the route's entity.
    #[must_use]
    pub fn with_loader(
        policy: Arc<dyn PolicyEvaluator>,
        rule: Rule,
        loader: Arc<dyn EntityLoader>,
    ) -> Self {
        Self {
            policy,
            rule,
            loader: Some(loader),
        }
    }

    async fn resolve_target(
        &self,
        state: &mut RequestState,
    ) -> Result<Option<Uuid>, AppError> {
        let (Some(loader), Some(raw)) = (self.loader.as_ref(), state.entity_id()) else {
            return Ok(None);
        };

        let id = raw
            .parse::<Uuid>()
            .map_err(|_| AppError::msg(ErrCode::Unauthenticated, "ID is not in its proper form"))?;

        let load = loader.load(id);
        let loaded = match state.deadline() {
            Some(at) => tokio::time::timeout_at(at, load).await.map_err(|_| {
                AppError::msg(ErrCode::DeadlineExceeded, "request deadline exceeded")
            })?,
            None => load.await,
        };

        let (entity, subject) = loaded.map_err(|e| {
            debug!(kind = loader.kind(), %id, error = %e, "entity load failed");
            match e {
                StoreError::Canceled => AppError::msg(ErrCode::Canceled, "request canceled"),
                StoreError::DeadlineExceeded => {
                    AppError::msg(ErrCode::DeadlineExceeded, "request deadline exceeded")
                }
                // NotFound included: unknown ids look exactly like foreign ones.
                _ => AppError::msg(ErrCode::Unauthenticated, "not authorized for that action"),
            }
        })?;

        state.set_entity(entity);
        Ok(Some(subject))
    }
}

impl Middleware for AuthorizeMiddleware {
    fn name(&self) -> &'static str {
        "authorize"
    }

    fn process<'a>(
        &'a self,
        state: &'a mut RequestState,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(async move {
            let Some(claims) = state.claims().cloned() else {
                return Err(Error::from(AppError::msg(
                    ErrCode::Unauthenticated,
                    "claims missing from request",
                )));
            };

            let target = self.resolve_target(state).await?;

            let mut query = AuthorizationQuery::new(claims, self.rule);
            if let Some(subject) = target {
                query = query.with_target(subject);
            }

            self.policy.evaluate(&query).await.map_err(|e| {
                let message = match &e {
                    AuthzError::Denied { .. } => "not authorized for that action",
                    _ => "authorization unavailable",
                };
                debug!(rule = %self.rule, error = %e, "authorization denied");
                AppError::msg(ErrCode::Unauthenticated, message)
            })?;

            next.run(state, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use crate::types::ResponseExt;
    use chrono::{Duration, Utc};
    use http::StatusCode;
    use tollgate_authz::RoleEvaluator;
    use tollgate_core::fixtures::MemoryProducts;
    use tollgate_core::store::ProductRecord;
    use tollgate_core::{Claims, Role};

    fn claims(subject: Uuid, roles: Vec<Role>) -> Claims {
        let now = Utc::now();
        Claims::new(subject, roles, "tollgate", now, now + Duration::hours(1))
    }

    fn empty_request() -> Request {
        http::Request::builder()
            .uri("/test")
            .body(http_body_util::Full::new(bytes::Bytes::new()))
            .unwrap()
    }

    fn product(owner: Uuid) -> ProductRecord {
        ProductRecord {
            id: Uuid::new_v4(),
            owner_id: owner,
            name: "widget".to_string(),
            cost: 9.99,
            quantity: 3,
        }
    }

    fn product_stage(products: MemoryProducts) -> AuthorizeMiddleware {
        AuthorizeMiddleware::with_loader(
            Arc::new(RoleEvaluator::new()),
            Rule::AdminOrSubject,
            Arc::new(ProductLoader(Arc::new(products))),
        )
    }

    async fn run(
        stage: AuthorizeMiddleware,
        state: &mut RequestState,
    ) -> Result<Response, Error> {
        Pipeline::builder()
            .stage(stage)
            .build()
            .process(state, empty_request(), |_, _| {
                Box::pin(async { Ok(Response::json(StatusCode::OK, &serde_json::json!({}))) })
            })
            .await
    }

    fn unwrap_app(result: Result<Response, Error>) -> AppError {
        match result.unwrap_err() {
            Error::App(app) => app,
            Error::Shutdown(_) => panic!("unexpected shutdown"),
        }
    }

    #[tokio::test]
    async fn test_owner_passes_and_entity_is_parked() {
        let owner = Uuid::new_v4();
        let p = product(owner);
        let pid = p.id;
        let stage = product_stage(MemoryProducts::with_products(vec![p]));

        let mut state = RequestState::new(None).with_entity_id(pid.to_string());
        state.set_claims(claims(owner, vec![Role::User]));
        run(stage, &mut state).await.unwrap();

        match state.entity() {
            Some(Entity::Product(found)) => assert_eq!(found.id, pid),
            other => panic!("expected parked product, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_foreign_user_denied() {
        let p = product(Uuid::new_v4());
        let pid = p.id;
        let stage = product_stage(MemoryProducts::with_products(vec![p]));

        let mut state = RequestState::new(None).with_entity_id(pid.to_string());
        state.set_claims(claims(Uuid::new_v4(), vec![Role::User]));
        let err = unwrap_app(run(stage, &mut state).await);
        assert_eq!(err.code(), ErrCode::Unauthenticated);
    }

    #[tokio::test]
    async fn test_admin_passes_for_foreign_entity() {
        let p = product(Uuid::new_v4());
        let pid = p.id;
        let stage = product_stage(MemoryProducts::with_products(vec![p]));

        let mut state = RequestState::new(None).with_entity_id(pid.to_string());
        state.set_claims(claims(Uuid::new_v4(), vec![Role::Admin]));
        run(stage, &mut state).await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_id_is_unauthenticated_not_bad_request() {
        let stage = product_stage(MemoryProducts::default());
        let mut state = RequestState::new(None).with_entity_id("not-a-uuid");
        state.set_claims(claims(Uuid::new_v4(), vec![Role::Admin]));

        let err = unwrap_app(run(stage, &mut state).await);
        assert_eq!(err.code(), ErrCode::Unauthenticated);
        assert_eq!(err.client_message(), "ID is not in its proper form");
    }

    #[tokio::test]
    async fn test_unknown_id_indistinguishable_from_foreign() {
        let p = product(Uuid::new_v4());
        let products = MemoryProducts::with_products(vec![p.clone()]);

        let mut state = RequestState::new(None).with_entity_id(Uuid::new_v4().to_string());
        state.set_claims(claims(Uuid::new_v4(), vec![Role::User]));
        let missing = unwrap_app(run(product_stage(products), &mut state).await);

        let mut state = RequestState::new(None).with_entity_id(p.id.to_string());
        state.set_claims(claims(Uuid::new_v4(), vec![Role::User]));
        let foreign = unwrap_app(
            run(product_stage(MemoryProducts::with_products(vec![p])), &mut state).await,
        );

        assert_eq!(missing.code(), foreign.code());
        assert_eq!(missing.client_message(), foreign.client_message());
    }

    #[tokio::test]
    async fn test_missing_claims_rejected() {
        let stage = AuthorizeMiddleware::new(Arc::new(RoleEvaluator::new()), Rule::Any);
        let mut state = RequestState::new(None);
        let err = unwrap_app(run(stage, &mut state).await);
        assert_eq!(err.code(), ErrCode::Unauthenticated);
    }
}

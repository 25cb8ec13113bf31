//! Per-request state threaded through the pipeline.
//!
//! [`RequestState`] is created once per request and visited by every stage.
//! Identity-bearing fields are write-once: the stage that owns a field sets
//! it exactly once on the way in, and downstream stages only read it. The
//! transaction slot is the one exception, since the transaction stage must
//! reclaim it on the way out.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use tokio::time::Instant;
use uuid::Uuid;

use tollgate_core::store::{HomeRecord, ProductRecord, Transaction, UserRecord};
use tollgate_core::{Claims, RequestId};

/// The entity a request targets, resolved during authorization.
///
/// Handlers for single-entity routes read this instead of fetching the row
/// again.
#[derive(Debug, Clone)]
pub enum Entity {
    /// A user row.
    User(UserRecord),
    /// A product row.
    Product(ProductRecord),
    /// A home row.
    Home(HomeRecord),
}

impl Entity {
    /// Returns the subject id that owns this entity.
    ///
    /// For users that is the user itself.
    #[must_use]
    pub const fn owner(&self) -> Uuid {
        match self {
            Self::User(u) => u.id,
            Self::Product(p) => p.owner_id,
            Self::Home(h) => h.owner_id,
        }
    }
}

/// Mutable state for one request's trip through the pipeline.
pub struct RequestState {
    request_id: RequestId,
    started_at: Instant,
    deadline: Option<Instant>,
    entity_id: Option<String>,
    claims: Option<Claims>,
    entity: Option<Entity>,
    transaction: Option<Arc<dyn Transaction>>,
    status: Option<StatusCode>,
}

impl RequestState {
    /// Creates state for a new request, with an optional overall timeout.
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        let started_at = Instant::now();
        Self {
            request_id: RequestId::new(),
            started_at,
            deadline: timeout.map(|t| started_at + t),
            entity_id: None,
            claims: None,
            entity: None,
            transaction: None,
            status: None,
        }
    }

    /// Attaches the raw entity id path segment, when the route has one.
    #[must_use]
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Returns the request id.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns when the request entered the pipeline.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the request deadline, if a timeout was configured.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the raw entity id from the route, unparsed.
    #[must_use]
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// Returns the caller's claims, once authentication has run.
    #[must_use]
    pub const fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }

    /// Records the caller's verified claims.
    pub fn set_claims(&mut self, claims: Claims) {
        debug_assert!(self.claims.is_none(), "claims set twice");
        self.claims = Some(claims);
    }

    /// Returns the resolved target entity, once authorization has run.
    #[must_use]
    pub const fn entity(&self) -> Option<&Entity> {
        self.entity.as_ref()
    }

    /// Records the resolved target entity.
    pub fn set_entity(&mut self, entity: Entity) {
        debug_assert!(self.entity.is_none(), "entity set twice");
        self.entity = Some(entity);
    }

    /// Returns the open transaction, if the route runs under one.
    #[must_use]
    pub fn transaction(&self) -> Option<Arc<dyn Transaction>> {
        self.transaction.clone()
    }

    /// Records the open transaction.
    pub fn set_transaction(&mut self, tx: Arc<dyn Transaction>) {
        debug_assert!(self.transaction.is_none(), "transaction set twice");
        self.transaction = Some(tx);
    }

    /// Removes and returns the transaction, leaving the slot empty.
    pub fn take_transaction(&mut self) -> Option<Arc<dyn Transaction>> {
        self.transaction.take()
    }

    /// Returns the final response status, once recorded.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Records the final response status for completion logging.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }
}

impl std::fmt::Debug for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestState")
            .field("request_id", &self.request_id)
            .field("deadline", &self.deadline)
            .field("entity_id", &self.entity_id)
            .field("claims", &self.claims)
            .field("has_transaction", &self.transaction.is_some())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

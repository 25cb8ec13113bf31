//! Storage seams the pipeline depends on.
//!
//! The stages never talk to a concrete database. They see three narrow
//! traits: [`Beginner`] to open a transaction, [`Transaction`] to finalize
//! it, and the per-entity lookup traits used during authentication and
//! authorization. Implementations live with the caller; in-memory fixtures
//! for tests live in [`crate::fixtures`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::claims::Role;
use crate::BoxFuture;

/// Errors produced by storage implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("not found")]
    NotFound,

    /// The operation was canceled before it ran.
    #[error("canceled")]
    Canceled,

    /// The operation ran out of time.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The transaction was already committed or rolled back.
    #[error("transaction already finalized")]
    Finalized,

    /// Any other storage failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A live database transaction.
///
/// Exactly one of `commit` or `rollback` finalizes it; a second call reports
/// [`StoreError::Finalized`], which callers on cleanup paths treat as benign.
pub trait Transaction: Send + Sync {
    /// Commits the transaction.
    fn commit(&self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Rolls the transaction back, discarding uncommitted writes.
    fn rollback(&self) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// Opens new transactions.
pub trait Beginner: Send + Sync {
    /// Begins a transaction.
    fn begin(&self) -> BoxFuture<'_, Result<Arc<dyn Transaction>, StoreError>>;
}

/// A stored user row.
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Unique id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Login email, unique across users.
    pub email: String,
    /// Roles granted to the user.
    pub roles: Vec<Role>,
    /// SHA-256 digest of the password.
    pub password_sha256: [u8; 32],
    /// Disabled users cannot authenticate.
    pub enabled: bool,
    /// When the row was created.
    pub date_created: DateTime<Utc>,
}

/// A stored product row.
#[derive(Debug, Clone)]
pub struct ProductRecord {
    /// Unique id.
    pub id: Uuid,
    /// The user who owns the product.
    pub owner_id: Uuid,
    /// Display name.
    pub name: String,
    /// Price per unit.
    pub cost: f64,
    /// Units in stock.
    pub quantity: i32,
}

/// A stored home row.
#[derive(Debug, Clone)]
pub struct HomeRecord {
    /// Unique id.
    pub id: Uuid,
    /// The user who owns the home.
    pub owner_id: Uuid,
    /// Kind of dwelling, e.g. "SINGLE FAMILY".
    pub kind: String,
}

/// Looks up users for authentication and authorization.
pub trait UserLookup: Send + Sync {
    /// Fetches a user by id.
    fn by_id(&self, id: Uuid) -> BoxFuture<'_, Result<UserRecord, StoreError>>;

    /// Fetches a user by login email.
    fn by_email(&self, email: &str) -> BoxFuture<'_, Result<UserRecord, StoreError>>;
}

/// Looks up products for ownership checks.
pub trait ProductLookup: Send + Sync {
    /// Fetches a product by id.
    fn by_id(&self, id: Uuid) -> BoxFuture<'_, Result<ProductRecord, StoreError>>;
}

/// Looks up homes for ownership checks.
pub trait HomeLookup: Send + Sync {
    /// Fetches a home by id.
    fn by_id(&self, id: Uuid) -> BoxFuture<'_, Result<HomeRecord, StoreError>>;
}

//! In-memory storage fixtures.
//!
//! A small transactional key-value store plus entity lookups backed by plain
//! maps. These exist so the pipeline can be exercised end to end in tests
//! without a real database; the semantics match the seams in [`crate::store`]
//! exactly, including double-finalize behavior.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::claims::Role;
use crate::store::{
    Beginner, HomeLookup, HomeRecord, ProductLookup, ProductRecord, StoreError, Transaction,
    UserLookup, UserRecord,
};
use crate::BoxFuture;

/// Computes the stored SHA-256 digest for a password.
#[must_use]
pub fn password_digest(password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Open,
    Committed,
    RolledBack,
}

/// A transaction over [`MemoryDb`].
///
/// Writes stage locally and become visible only on commit.
pub struct MemoryTx {
    rows: Arc<Mutex<HashMap<String, String>>>,
    staged: Mutex<HashMap<String, String>>,
    state: Mutex<TxState>,
}

impl MemoryTx {
    /// Stages a write visible only after commit.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.staged.lock().insert(key.into(), value.into());
    }

    /// Returns true if the transaction was committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        *self.state.lock() == TxState::Committed
    }

    /// Returns true if the transaction was rolled back.
    #[must_use]
    pub fn is_rolled_back(&self) -> bool {
        *self.state.lock() == TxState::RolledBack
    }

    fn finalize(&self, to: TxState) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if *state != TxState::Open {
            return Err(StoreError::Finalized);
        }
        if to == TxState::Committed {
            let staged = std::mem::take(&mut *self.staged.lock());
            self.rows.lock().extend(staged);
        } else {
            self.staged.lock().clear();
        }
        *state = to;
        Ok(())
    }
}

impl Transaction for MemoryTx {
    fn commit(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move { self.finalize(TxState::Committed) })
    }

    fn rollback(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move { self.finalize(TxState::RolledBack) })
    }
}

/// A transactional in-memory key-value store.
///
/// The last transaction handed out stays reachable through [`MemoryDb::latest`]
/// so tests can assert how it was finalized.
#[derive(Default)]
pub struct MemoryDb {
    rows: Arc<Mutex<HashMap<String, String>>>,
    latest: Mutex<Option<Arc<MemoryTx>>>,
}

impl MemoryDb {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a committed value.
    #[must_use]
    pub fn read(&self, key: &str) -> Option<String> {
        self.rows.lock().get(key).cloned()
    }

    /// Returns the most recently begun transaction.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<MemoryTx>> {
        self.latest.lock().clone()
    }
}

impl Beginner for MemoryDb {
    fn begin(&self) -> BoxFuture<'_, Result<Arc<dyn Transaction>, StoreError>> {
        Box::pin(async move {
            let tx = Arc::new(MemoryTx {
                rows: Arc::clone(&self.rows),
                staged: Mutex::new(HashMap::new()),
                state: Mutex::new(TxState::Open),
            });
            *self.latest.lock() = Some(Arc::clone(&tx));
            Ok(Arc::clone(&tx) as Arc<dyn Transaction>)
        })
    }
}

/// User lookup backed by a map.
#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<HashMap<Uuid, UserRecord>>,
}

impl MemoryUsers {
    /// Creates a store preloaded with the given users.
    #[must_use]
    pub fn with_users(users: Vec<UserRecord>) -> Self {
        Self {
            users: Mutex::new(users.into_iter().map(|u| (u.id, u)).collect()),
        }
    }

    /// Adds or replaces a user.
    pub fn insert(&self, user: UserRecord) {
        self.users.lock().insert(user.id, user);
    }
}

impl UserLookup for MemoryUsers {
    fn by_id(&self, id: Uuid) -> BoxFuture<'_, Result<UserRecord, StoreError>> {
        Box::pin(async move { self.users.lock().get(&id).cloned().ok_or(StoreError::NotFound) })
    }

    fn by_email(&self, email: &str) -> BoxFuture<'_, Result<UserRecord, StoreError>> {
        let email = email.to_string();
        Box::pin(async move {
            self.users
                .lock()
                .values()
                .find(|u| u.email == email)
                .cloned()
                .ok_or(StoreError::NotFound)
        })
    }
}

/// Product lookup backed by a map.
#[derive(Default)]
pub struct MemoryProducts {
    products: Mutex<HashMap<Uuid, ProductRecord>>,
}

impl MemoryProducts {
    /// Creates a store preloaded with the given products.
    #[must_use]
    pub fn with_products(products: Vec<ProductRecord>) -> Self {
        Self {
            products: Mutex::new(products.into_iter().map(|p| (p.id, p)).collect()),
        }
    }
}

impl ProductLookup for MemoryProducts {
    fn by_id(&self, id: Uuid) -> BoxFuture<'_, Result<ProductRecord, StoreError>> {
        Box::pin(async move {
            self.products
                .lock()
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound)
        })
    }
}

/// Home lookup backed by a map.
#[derive(Default)]
pub struct MemoryHomes {
    homes: Mutex<HashMap<Uuid, HomeRecord>>,
}

impl MemoryHomes {
    /// Creates a store preloaded with the given homes.
    #[must_use]
    pub fn with_homes(homes: Vec<HomeRecord>) -> Self {
        Self {
            homes: Mutex::new(homes.into_iter().map(|h| (h.id, h)).collect()),
        }
    }
}

impl HomeLookup for MemoryHomes {
    fn by_id(&self, id: Uuid) -> BoxFuture<'_, Result<HomeRecord, StoreError>> {
        Box::pin(async move { self.homes.lock().get(&id).cloned().ok_or(StoreError::NotFound) })
    }
}

/// Mints claims for a user record, valid for one hour.
#[must_use]
pub fn claims_for(user: &UserRecord) -> crate::Claims {
    let now = Utc::now();
    crate::Claims::new(
        user.id,
        user.roles.clone(),
        "tollgate",
        now,
        now + chrono::Duration::hours(1),
    )
}

/// Builds a user record with a hashed password, ready for insertion.
#[must_use]
pub fn user_record(name: &str, email: &str, password: &str, roles: Vec<Role>) -> UserRecord {
    UserRecord {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        roles,
        password_sha256: password_digest(password),
        enabled: true,
        date_created: Utc::now(),
    }
}

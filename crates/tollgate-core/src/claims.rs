//! Caller identity extracted from a verified credential.
//!
//! [`Claims`] are produced by the authentication stage and consumed read-only
//! by authorization and business handlers. Once constructed they are never
//! mutated, only cloned or borrowed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A role granted to a caller.
///
/// The set is closed: an unknown role name in a token or a stored user record
/// is a parse error, not a silently-ignored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Full administrative access.
    Admin,
    /// Regular user access.
    User,
}

impl Role {
    /// Returns the canonical wire name of the role.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone, Error)]
#[error("unknown role {0:?}")]
pub struct RoleParseError(pub String);

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Self::Admin),
            "USER" => Ok(Self::User),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

/// Verified identity and role set for one caller.
///
/// Produced once by the authentication stage; read-only for the remainder of
/// the request. Expiry is checked at parse time, so holding a `Claims` value
/// implies the credential was valid when the request entered the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    subject: Uuid,
    roles: Vec<Role>,
    issuer: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Claims {
    /// Constructs a new claims value.
    #[must_use]
    pub fn new(
        subject: Uuid,
        roles: Vec<Role>,
        issuer: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject,
            roles,
            issuer: issuer.into(),
            issued_at,
            expires_at,
        }
    }

    /// Returns the subject id the credential was issued for.
    #[must_use]
    pub const fn subject(&self) -> Uuid {
        self.subject
    }

    /// Returns the granted roles.
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Returns the issuer of the credential.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns when the credential was issued.
    #[must_use]
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Returns when the credential expires.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the claims carry the given role.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Returns true if the claims carry at least one of the given roles.
    #[must_use]
    pub fn authorized(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.has_role(*r))
    }

    /// Returns true if the credential is expired at the given instant.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

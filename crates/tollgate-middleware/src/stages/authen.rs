//! Authentication middleware.
//!
//! Verifies the request's credential and records the resulting
//! [`Claims`] on the request state. Two schemes are supported:
//!
//! - **Bearer**: a signed JWT. The key id in the token header selects the
//!   verification key, and the token's subject must resolve to an enabled
//!   user.
//! - **Basic**: email and password. The password digest is compared in
//!   constant time against the stored one, and the minted claims get a
//!   one-year expiry, matching what a freshly issued token would carry.
//!
//! Every verification failure collapses to the same `Unauthenticated` error
//! with a generic message. Which check failed is logged at debug level but
//! never disclosed to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use tollgate_core::store::{StoreError, UserLookup, UserRecord};
use tollgate_core::{AppError, BoxFuture, Claims, ErrCode, Error, Role};

use crate::context::RequestState;
use crate::middleware::{Middleware, Next};
use crate::types::{Request, Response};

/// Validity of claims minted from a Basic credential.
const BASIC_CLAIMS_TTL_DAYS: i64 = 365;

/// A parsed Authorization header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// A bearer token, signature not yet verified.
    Bearer(String),
    /// Email and password from a Basic header, base64 already stripped.
    Basic {
        /// Login email.
        email: String,
        /// Plaintext password.
        password: String,
    },
}

impl Credential {
    /// Parses an Authorization header value.
    pub fn parse(header: &str) -> Result<Self, AppError> {
        let Some((scheme, payload)) = header.split_once(' ') else {
            return Err(unauthenticated("malformed authorization header"));
        };

        if scheme.eq_ignore_ascii_case("bearer") {
            return Ok(Self::Bearer(payload.trim().to_string()));
        }

        if scheme.eq_ignore_ascii_case("basic") {
            let decoded = BASE64
                .decode(payload.trim())
                .map_err(|_| unauthenticated("basic credentials are not valid base64"))?;
            let text = String::from_utf8(decoded)
                .map_err(|_| unauthenticated("basic credentials are not valid utf-8"))?;
            let Some((email, password)) = text.split_once(':') else {
                return Err(unauthenticated("basic credentials missing separator"));
            };
            return Ok(Self::Basic {
                email: email.to_string(),
                password: password.to_string(),
            });
        }

        Err(unauthenticated(
            "expected authorization header format: Bearer <token> or Basic <credentials>",
        ))
    }
}

/// Verifies credentials into claims.
///
/// The seam between the pipeline and the identity system: the built-in
/// [`LocalAuthenticator`] verifies against local keys and the user store,
/// and a remote token service can stand in behind the same trait.
pub trait Authenticator: Send + Sync {
    /// Verifies the credential, bounded by the request deadline.
    fn authenticate(
        &self,
        credential: Credential,
        deadline: Option<Instant>,
    ) -> BoxFuture<'_, Result<Claims, AppError>>;
}

/// Resolves a token's key id to its verification key.
pub trait KeyResolver: Send + Sync {
    /// Returns the key for the given id, or `None` if unknown.
    fn resolve(&self, kid: &str) -> Option<DecodingKey>;
}

/// A fixed in-memory key set.
#[derive(Default)]
pub struct StaticKeys {
    keys: HashMap<String, DecodingKey>,
}

impl StaticKeys {
    /// Creates an empty key set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key under the given id.
    #[must_use]
    pub fn with_key(mut self, kid: impl Into<String>, key: DecodingKey) -> Self {
        self.keys.insert(kid.into(), key);
        self
    }
}

impl KeyResolver for StaticKeys {
    fn resolve(&self, kid: &str) -> Option<DecodingKey> {
        self.keys.get(kid).cloned()
    }
}

/// The on-the-wire claim set carried inside tokens.
#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: Uuid,
    iss: String,
    iat: i64,
    exp: i64,
    roles: Vec<String>,
}

/// Signs a token for the given subject.
///
/// The counterpart of what [`LocalAuthenticator`] verifies; used by token
/// issuance endpoints and tests.
pub fn issue_token(
    key: &EncodingKey,
    kid: &str,
    algorithm: Algorithm,
    issuer: &str,
    subject: Uuid,
    roles: &[Role],
    ttl: Duration,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = TokenClaims {
        sub: subject,
        iss: issuer.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
        roles: roles.iter().map(|r| r.name().to_string()).collect(),
    };
    let header = Header {
        kid: Some(kid.to_string()),
        ..Header::new(algorithm)
    };
    encode(&header, &claims, key)
        .map_err(|e| AppError::new(ErrCode::Internal, anyhow::Error::from(e)))
}

/// Verifies credentials against local keys and the user store.
pub struct LocalAuthenticator {
    algorithm: Algorithm,
    issuer: String,
    keys: Arc<dyn KeyResolver>,
    users: Arc<dyn UserLookup>,
}

impl LocalAuthenticator {
    /// Creates an authenticator.
    #[must_use]
    pub fn new(
        algorithm: Algorithm,
        issuer: impl Into<String>,
        keys: Arc<dyn KeyResolver>,
        users: Arc<dyn UserLookup>,
    ) -> Self {
        Self {
            algorithm,
            issuer: issuer.into(),
            keys,
            users,
        }
    }

    async fn bearer(&self, token: &str, deadline: Option<Instant>) -> Result<Claims, AppError> {
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "token header rejected");
            unauthenticated("authentication failed")
        })?;
        let kid = header
            .kid
            .ok_or_else(|| unauthenticated("authentication failed"))?;
        let key = self
            .keys
            .resolve(&kid)
            .ok_or_else(|| unauthenticated("authentication failed"))?;

        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);

        let token = decode::<TokenClaims>(token, &key, &validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            unauthenticated("authentication failed")
        })?;
        let wire = token.claims;

        let roles = parse_roles(&wire.roles)?;

        // The token alone is not enough; its subject must still be an
        // enabled user.
        let user = lookup(deadline, self.users.by_id(wire.sub)).await?;
        if !user.enabled {
            debug!(user_id = %user.id, "disabled user rejected");
            return Err(unauthenticated("authentication failed"));
        }

        Ok(Claims::new(
            wire.sub,
            roles,
            wire.iss,
            timestamp(wire.iat)?,
            timestamp(wire.exp)?,
        ))
    }

    async fn basic(
        &self,
        email: &str,
        password: &str,
        deadline: Option<Instant>,
    ) -> Result<Claims, AppError> {
        let user = lookup(deadline, self.users.by_email(email)).await?;

        if !user.enabled {
            debug!(user_id = %user.id, "disabled user rejected");
            return Err(unauthenticated("authentication failed"));
        }

        if !digests_match(&password_digest(password), &user.password_sha256) {
            debug!(user_id = %user.id, "password mismatch");
            return Err(unauthenticated("authentication failed"));
        }

        let now = Utc::now();
        Ok(Claims::new(
            user.id,
            user.roles,
            self.issuer.clone(),
            now,
            now + Duration::days(BASIC_CLAIMS_TTL_DAYS),
        ))
    }
}

impl Authenticator for LocalAuthenticator {
    fn authenticate(
        &self,
        credential: Credential,
        deadline: Option<Instant>,
    ) -> BoxFuture<'_, Result<Claims, AppError>> {
        Box::pin(async move {
            match credential {
                Credential::Bearer(token) => self.bearer(&token, deadline).await,
                Credential::Basic { email, password } => {
                    self.basic(&email, &password, deadline).await
                }
            }
        })
    }
}

/// Middleware that authenticates every request on its route.
pub struct AuthenMiddleware {
    authenticator: Arc<dyn Authenticator>,
}

impl AuthenMiddleware {
    /// Creates the authentication stage.
    #[must_use]
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }
}

impl Middleware for AuthenMiddleware {
    fn name(&self) -> &'static str {
        "authen"
    }

    fn process<'a>(
        &'a self,
        state: &'a mut RequestState,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(async move {
            let header = request
                .headers()
                .get(http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| unauthenticated("authorization header missing"))?;

            let credential = Credential::parse(header)?;
            let claims = self
                .authenticator
                .authenticate(credential, state.deadline())
                .await?;
            state.set_claims(claims);

            next.run(state, request).await
        })
    }
}

/// Computes the SHA-256 digest stored for a password.
#[must_use]
pub fn password_digest(password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Compares two digests without an early exit on the first differing byte.
fn digests_match(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn parse_roles(names: &[String]) -> Result<Vec<Role>, AppError> {
    names
        .iter()
        .map(|n| n.parse::<Role>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            debug!(error = %e, "token carried unknown role");
            unauthenticated("authentication failed")
        })
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| unauthenticated("authentication failed"))
}

fn unauthenticated(message: &str) -> AppError {
    AppError::msg(ErrCode::Unauthenticated, message)
}

/// Runs a store lookup bounded by the request deadline.
async fn lookup<F>(deadline: Option<Instant>, fut: F) -> Result<UserRecord, AppError>
where
    F: std::future::Future<Output = Result<UserRecord, StoreError>> + Send,
{
    let result = match deadline {
        Some(at) => tokio::time::timeout_at(at, fut)
            .await
            .map_err(|_| AppError::msg(ErrCode::DeadlineExceeded, "request deadline exceeded"))?,
        None => fut.await,
    };

    result.map_err(|e| match e {
        StoreError::Canceled => AppError::msg(ErrCode::Canceled, "request canceled"),
        StoreError::DeadlineExceeded => {
            AppError::msg(ErrCode::DeadlineExceeded, "request deadline exceeded")
        }
        other => {
            debug!(error = %other, "user lookup failed");
            unauthenticated("authentication failed")
        }
    })
}

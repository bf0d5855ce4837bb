//! Signed session tokens.
//!
//! # Overview
//! Sessions are HS256 JWTs minted by the identity service and verified by the
//! gateway. Both sides build [`SessionKeys`] from the same shared secret.
//!
//! # Errors
//! - [`TrustError::InvalidSession`] for bad signatures, expiry, or malformed tokens.
//! - [`TrustError::WrongTokenKind`] when a renewal token is presented where an
//!   access token is required (or the reverse).
use crate::{Role, TrustError, TrustResult};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Renewal,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Renewal => f.write_str("renewal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub handle: String,
    pub role: Role,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub kind: TokenKind,
}

impl SessionClaims {
    /// Claims for a fresh token with a new token id, valid for `ttl` from now.
    pub fn new(
        principal_id: Uuid,
        handle: &str,
        role: Role,
        kind: TokenKind,
        ttl: Duration,
    ) -> Self {
        let now = unix_now();
        Self {
            sub: principal_id,
            handle: handle.to_string(),
            role,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
            kind,
        }
    }

    /// Seconds left before expiry, clamped at zero.
    pub fn remaining(&self) -> Duration {
        Duration::from_secs((self.exp - unix_now()).max(0) as u64)
    }
}

#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    leeway_secs: u64,
}

impl SessionKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            leeway_secs: 30,
        }
    }

    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    pub fn leeway(&self) -> Duration {
        Duration::from_secs(self.leeway_secs)
    }

    /// Last unix second at which [`SessionKeys::verify`] still accepts a token
    /// expiring at `exp`. Revocation state must outlive this instant.
    pub fn honored_until(&self, exp: i64) -> i64 {
        exp + self.leeway_secs as i64
    }

    pub fn sign(&self, claims: &SessionClaims) -> TrustResult<String> {
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding,
        )?)
    }

    pub fn verify(&self, token: &str, expected: TokenKind) -> TrustResult<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &validation)?;
        if data.claims.kind != expected {
            return Err(TrustError::WrongTokenKind {
                expected: expected.to_string(),
                actual: data.claims.kind.to_string(),
            });
        }
        Ok(data.claims)
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("leeway_secs", &self.leeway_secs)
            .finish_non_exhaustive()
    }
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

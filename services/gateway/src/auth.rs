//! Bearer session verification and revocation lookups.
use crate::error::GatewayError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use dashmap::DashMap;
use questline_trust::{ForwardedClaim, SessionKeys, TokenKind, unix_now};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait RevocationCheck: Send + Sync {
    /// `honored_until` is the last unix second the token still verifies.
    async fn is_revoked(&self, token_id: &str, honored_until: i64) -> Result<bool>;
}

#[derive(Debug, Deserialize)]
struct SessionStatus {
    revoked: bool,
}

/// Asks the identity service whether a session was revoked.
///
/// Revocations are final, so positive answers are cached until the token
/// would stop verifying anyway. Negative answers are never cached.
#[derive(Clone)]
pub struct IdentityRevocationClient {
    base_url: String,
    client: reqwest::Client,
    revoked: Arc<DashMap<String, i64>>,
}

impl IdentityRevocationClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build revocation client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            revoked: Arc::new(DashMap::new()),
        })
    }

    fn cached(&self, token_id: &str) -> bool {
        let now = unix_now();
        let hit = self
            .revoked
            .get(token_id)
            .is_some_and(|expiry| *expiry > now);
        if !hit {
            self.revoked.remove_if(token_id, |_, expiry| *expiry <= now);
        }
        hit
    }
}

#[async_trait]
impl RevocationCheck for IdentityRevocationClient {
    async fn is_revoked(&self, token_id: &str, honored_until: i64) -> Result<bool> {
        if self.cached(token_id) {
            return Ok(true);
        }
        let url = format!("{}/internal/sessions/{token_id}", self.base_url);
        let status: SessionStatus = self
            .client
            .get(url)
            .send()
            .await
            .context("session status request")?
            .error_for_status()
            .context("session status")?
            .json()
            .await
            .context("session status body")?;
        if status.revoked {
            self.revoked.insert(token_id.to_string(), honored_until);
        }
        Ok(status.revoked)
    }
}

#[derive(Clone)]
pub struct Authenticator {
    keys: SessionKeys,
    revocation: Arc<dyn RevocationCheck>,
}

impl Authenticator {
    pub fn new(keys: SessionKeys, revocation: Arc<dyn RevocationCheck>) -> Self {
        Self { keys, revocation }
    }

    /// Verify the bearer token and derive the claim forwarded downstream.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<ForwardedClaim, GatewayError> {
        let token = bearer_token(headers)
            .ok_or_else(|| GatewayError::Unauthorized("missing bearer token".to_string()))?;
        let claims = self.keys.verify(token, TokenKind::Access).map_err(|err| {
            tracing::debug!(error = %err, "session token rejected");
            GatewayError::Unauthorized("invalid session token".to_string())
        })?;
        let revoked = self
            .revocation
            .is_revoked(&claims.jti, self.keys.honored_until(claims.exp))
            .await
            .map_err(|err| {
                tracing::warn!(error = %format!("{err:#}"), "revocation check failed");
                GatewayError::UpstreamFailure("session check unavailable".to_string())
            })?;
        if revoked {
            return Err(GatewayError::Unauthorized("session revoked".to_string()));
        }
        Ok(ForwardedClaim::from_session(&claims))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

//! Session issuance, revocation, and renewal.
//!
//! # Keyspaces
//! - `refresh:{handle}`: the one live renewal token of a handle.
//! - `revoked:{jti}`: `"false"` at issue, `"true"` after logout. Each marker
//!   lives as long as verification still accepts the access token it
//!   describes, leeway included.
//!
//! Nothing else writes these keys.
pub mod ttl;

use questline_trust::{Role, SessionClaims, SessionKeys, TokenKind, TrustError, unix_now};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use ttl::TtlStore;
use uuid::Uuid;

pub use ttl::InMemoryTtlStore;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no active renewal token for {0}")]
    InvalidRenewalToken(String),
    #[error(transparent)]
    Token(#[from] TrustError),
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub access_ttl: Duration,
    pub renewal_ttl: Duration,
    pub rotate_renewal_on_use: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            access_ttl: Duration::from_secs(3600),
            renewal_ttl: Duration::from_secs(604_800),
            rotate_renewal_on_use: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSession {
    pub session_token: String,
    pub renewal_token: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewedSession {
    pub session_token: String,
    /// Only present when renewal tokens rotate on use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewal_token: Option<String>,
    pub expires_at: i64,
}

/// Identity the session is minted for.
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub principal_id: Uuid,
    pub handle: &'a str,
    pub role: Role,
}

fn refresh_key(handle: &str) -> String {
    format!("refresh:{handle}")
}

fn revoked_key(token_id: &str) -> String {
    format!("revoked:{token_id}")
}

#[derive(Clone)]
pub struct SessionService {
    keys: SessionKeys,
    store: Arc<dyn TtlStore>,
    settings: SessionSettings,
}

impl SessionService {
    pub fn new(keys: SessionKeys, store: Arc<dyn TtlStore>, settings: SessionSettings) -> Self {
        Self {
            keys,
            store,
            settings,
        }
    }

    pub async fn issue(&self, subject: Subject<'_>) -> Result<IssuedSession, SessionError> {
        let access = self.claims(subject, TokenKind::Access);
        let session_token = self.keys.sign(&access)?;
        let renewal_token = self.mint_renewal(subject).await?;
        self.store
            .put(
                &revoked_key(&access.jti),
                "false".to_string(),
                self.settings.access_ttl + self.keys.leeway(),
            )
            .await;
        tracing::debug!(handle = subject.handle, token_id = %access.jti, "session issued");
        Ok(IssuedSession {
            session_token,
            renewal_token,
            expires_at: access.exp,
        })
    }

    /// Drop the renewal record and mark the access token revoked for the rest
    /// of its lifetime.
    pub async fn revoke(&self, handle: &str, token_id: &str, token_expiry: i64) {
        self.store.delete(&refresh_key(handle)).await;
        let honored_until = self.keys.honored_until(token_expiry);
        let remaining = Duration::from_secs((honored_until - unix_now()).max(0) as u64);
        self.store
            .put(&revoked_key(token_id), "true".to_string(), remaining)
            .await;
        tracing::info!(handle, token_id, "session revoked");
    }

    pub async fn renew(&self, subject: Subject<'_>) -> Result<RenewedSession, SessionError> {
        if self.store.get(&refresh_key(subject.handle)).await.is_none() {
            return Err(SessionError::InvalidRenewalToken(subject.handle.to_string()));
        }
        let access = self.claims(subject, TokenKind::Access);
        let session_token = self.keys.sign(&access)?;
        self.store
            .put(
                &revoked_key(&access.jti),
                "false".to_string(),
                self.settings.access_ttl + self.keys.leeway(),
            )
            .await;
        let renewal_token = if self.settings.rotate_renewal_on_use {
            Some(self.mint_renewal(subject).await?)
        } else {
            None
        };
        Ok(RenewedSession {
            session_token,
            renewal_token,
            expires_at: access.exp,
        })
    }

    pub async fn is_revoked(&self, token_id: &str) -> bool {
        self.store
            .get(&revoked_key(token_id))
            .await
            .is_some_and(|value| value == "true")
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        Ok(self.keys.verify(token, TokenKind::Access)?)
    }

    fn claims(&self, subject: Subject<'_>, kind: TokenKind) -> SessionClaims {
        let ttl = match kind {
            TokenKind::Access => self.settings.access_ttl,
            TokenKind::Renewal => self.settings.renewal_ttl,
        };
        SessionClaims::new(subject.principal_id, subject.handle, subject.role, kind, ttl)
    }

    async fn mint_renewal(&self, subject: Subject<'_>) -> Result<String, SessionError> {
        let renewal = self.claims(subject, TokenKind::Renewal);
        let token = self.keys.sign(&renewal)?;
        self.store
            .put(
                &refresh_key(subject.handle),
                token.clone(),
                self.settings.renewal_ttl,
            )
            .await;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(settings: SessionSettings) -> (SessionService, InMemoryTtlStore) {
        let store = InMemoryTtlStore::new();
        let service = SessionService::new(
            SessionKeys::from_secret(b"session-test-secret"),
            Arc::new(store.clone()),
            settings,
        );
        (service, store)
    }

    fn subject(principal_id: Uuid) -> Subject<'static> {
        Subject {
            principal_id,
            handle: "ada",
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn issue_stores_renewal_and_clear_marker() {
        let (service, store) = service(SessionSettings::default());
        let issued = service.issue(subject(Uuid::new_v4())).await.expect("issue");
        let claims = service.verify(&issued.session_token).expect("verify");
        assert_eq!(claims.handle, "ada");
        assert_eq!(
            store.get("refresh:ada").await.as_deref(),
            Some(issued.renewal_token.as_str())
        );
        assert_eq!(
            store.get(&format!("revoked:{}", claims.jti)).await.as_deref(),
            Some("false")
        );
        assert!(!service.is_revoked(&claims.jti).await);
        assert!(service.verify(&issued.renewal_token).is_err());
    }

    #[tokio::test]
    async fn revoke_blocks_token_and_renewal() {
        let (service, store) = service(SessionSettings::default());
        let principal_id = Uuid::new_v4();
        let issued = service.issue(subject(principal_id)).await.expect("issue");
        let claims = service.verify(&issued.session_token).expect("verify");

        service.revoke("ada", &claims.jti, claims.exp).await;
        assert!(service.is_revoked(&claims.jti).await);
        assert!(store.get("refresh:ada").await.is_none());
        assert!(matches!(
            service.renew(subject(principal_id)).await,
            Err(SessionError::InvalidRenewalToken(_))
        ));
    }

    #[tokio::test]
    async fn revocation_of_expired_token_clamps_to_zero() {
        let (service, _) = service(SessionSettings::default());
        service.revoke("ada", "stale", unix_now() - 100).await;
        assert!(!service.is_revoked("stale").await);
    }

    #[tokio::test(start_paused = true)]
    async fn revocation_outlives_expiry_by_the_verification_leeway() {
        let (service, _) = service(SessionSettings {
            access_ttl: Duration::from_secs(1),
            ..SessionSettings::default()
        });
        let issued = service.issue(subject(Uuid::new_v4())).await.expect("issue");
        let claims = service.verify(&issued.session_token).expect("verify");
        service.revoke("ada", &claims.jti, claims.exp).await;

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(service.is_revoked(&claims.jti).await);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!service.is_revoked(&claims.jti).await);
    }

    #[tokio::test]
    async fn revocation_of_token_inside_leeway_is_kept() {
        let (service, _) = service(SessionSettings::default());
        service.revoke("ada", "grace", unix_now() - 5).await;
        assert!(service.is_revoked("grace").await);
    }

    #[tokio::test]
    async fn renew_mints_new_token_and_keeps_renewal_by_default() {
        let (service, store) = service(SessionSettings::default());
        let principal_id = Uuid::new_v4();
        let issued = service.issue(subject(principal_id)).await.expect("issue");
        let renewed = service.renew(subject(principal_id)).await.expect("renew");
        assert!(renewed.renewal_token.is_none());
        let first = service.verify(&issued.session_token).expect("first");
        let second = service.verify(&renewed.session_token).expect("second");
        assert_ne!(first.jti, second.jti);
        assert_eq!(
            store.get("refresh:ada").await.as_deref(),
            Some(issued.renewal_token.as_str())
        );
    }

    #[tokio::test]
    async fn rotation_replaces_stored_renewal_token() {
        let (service, store) = service(SessionSettings {
            rotate_renewal_on_use: true,
            ..SessionSettings::default()
        });
        let principal_id = Uuid::new_v4();
        let issued = service.issue(subject(principal_id)).await.expect("issue");
        let renewed = service.renew(subject(principal_id)).await.expect("renew");
        let rotated = renewed.renewal_token.expect("rotated token");
        assert_ne!(rotated, issued.renewal_token);
        assert_eq!(store.get("refresh:ada").await.as_deref(), Some(rotated.as_str()));
    }
}

#![allow(dead_code)]

use async_trait::async_trait;
use identity::app::{AppState, build_router};
use identity::saga::{DeletionSaga, ExternalResources, InMemorySagaLog};
use identity::session::{InMemoryTtlStore, SessionService, SessionSettings};
use identity::store::memory::InMemoryPrincipalStore;
use parking_lot::Mutex;
use questline_bus::InMemoryBus;
use questline_trust::{ForwardedClaim, SessionKeys, TokenKind, encode};
use std::sync::Arc;
use uuid::Uuid;

pub const SECRET: &[u8] = b"identity-integration-secret";

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Cleanup(Uuid),
    Restore(Uuid),
}

/// Records calls and fails the operations it is told to fail.
#[derive(Default)]
pub struct ScriptedResources {
    pub calls: Mutex<Vec<Call>>,
    pub fail_cleanup: bool,
    pub fail_restore: bool,
}

impl ScriptedResources {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ExternalResources for ScriptedResources {
    async fn cleanup(&self, principal_id: Uuid) -> anyhow::Result<()> {
        self.calls.lock().push(Call::Cleanup(principal_id));
        if self.fail_cleanup {
            anyhow::bail!("events service unavailable");
        }
        Ok(())
    }

    async fn restore(&self, principal_id: Uuid) -> anyhow::Result<()> {
        self.calls.lock().push(Call::Restore(principal_id));
        if self.fail_restore {
            anyhow::bail!("events service unavailable");
        }
        Ok(())
    }
}

pub struct TestApp {
    pub router: axum::Router,
    pub principals: InMemoryPrincipalStore,
    pub sessions: SessionService,
    pub bus: InMemoryBus,
    pub saga_log: InMemorySagaLog,
    pub external: Arc<ScriptedResources>,
}

pub fn test_app() -> TestApp {
    test_app_with(ScriptedResources::default())
}

pub fn test_app_with(external: ScriptedResources) -> TestApp {
    let principals = InMemoryPrincipalStore::new();
    let sessions = SessionService::new(
        SessionKeys::from_secret(SECRET),
        Arc::new(InMemoryTtlStore::new()),
        SessionSettings::default(),
    );
    let bus = InMemoryBus::new();
    let saga_log = InMemorySagaLog::new();
    let external = Arc::new(external);
    let saga = Arc::new(DeletionSaga::new(
        Arc::new(principals.clone()),
        external.clone(),
        Arc::new(saga_log.clone()),
        Arc::new(bus.clone()),
    ));
    let router = build_router(AppState {
        principals: Arc::new(principals.clone()),
        sessions: sessions.clone(),
        bus: Arc::new(bus.clone()),
        saga,
    });
    TestApp {
        router,
        principals,
        sessions,
        bus,
        saga_log,
        external,
    }
}

/// Trust header the gateway would forward for `session_token`.
pub fn trust_for(session_token: &str) -> (ForwardedClaim, String) {
    let claims = SessionKeys::from_secret(SECRET)
        .verify(session_token, TokenKind::Access)
        .expect("verify session");
    let claim = ForwardedClaim::from_session(&claims);
    let header = encode(&claim).expect("encode claim");
    (claim, header)
}

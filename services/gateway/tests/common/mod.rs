#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use gateway::app::{GatewayState, build_router};
use gateway::auth::{Authenticator, RevocationCheck};
use gateway::policy::{RouteTable, default_rules};
use gateway::proxy::Upstreams;
use questline_trust::{Role, SessionClaims, SessionKeys, TRUST_HEADER, TokenKind};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const SECRET: &[u8] = b"gateway-integration-secret";

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[derive(Default)]
pub struct RevokedSet(pub Mutex<HashSet<String>>);

#[async_trait]
impl RevocationCheck for RevokedSet {
    async fn is_revoked(&self, token_id: &str, _token_expiry: i64) -> anyhow::Result<bool> {
        Ok(self.0.lock().expect("lock").contains(token_id))
    }
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    axum::Json(serde_json::json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "trust": header(TRUST_HEADER),
        "authorization": header("authorization"),
        "traceparent": header("traceparent"),
        "body": String::from_utf8_lossy(&body),
    }))
}

/// Downstream stand-in: echoes requests, 404s under `/events/missing`, and
/// stalls under `/events/slow`.
pub async fn spawn_downstream() -> SocketAddr {
    let app = Router::new()
        .route(
            "/events/missing",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    axum::Json(serde_json::json!({
                        "code": "not_found",
                        "message": "campaign not found",
                        "request_id": null,
                    })),
                )
            }),
        )
        .route(
            "/events/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
        .fallback(echo);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    addr
}

pub struct TestGateway {
    pub router: Router,
    pub revoked: Arc<RevokedSet>,
    pub keys: SessionKeys,
}

pub fn gateway(auth: SocketAddr, events: SocketAddr, timeout: Duration) -> TestGateway {
    let keys = SessionKeys::from_secret(SECRET);
    let revoked = Arc::new(RevokedSet::default());
    let services = HashMap::from([
        ("auth".to_string(), format!("http://{auth}")),
        ("events".to_string(), format!("http://{events}/")),
    ]);
    let state = GatewayState {
        routes: Arc::new(RouteTable::new(default_rules()).expect("routes")),
        auth: Authenticator::new(keys.clone(), revoked.clone()),
        upstreams: Upstreams::new(services, timeout).expect("upstreams"),
    };
    TestGateway {
        router: build_router(state),
        revoked,
        keys,
    }
}

impl TestGateway {
    /// Signed access token and its claims for a fresh principal.
    pub fn session(&self, role: Role) -> (SessionClaims, String) {
        let claims = SessionClaims::new(
            Uuid::new_v4(),
            "tester",
            role,
            TokenKind::Access,
            Duration::from_secs(600),
        );
        let token = self.keys.sign(&claims).expect("sign");
        (claims, token)
    }
}

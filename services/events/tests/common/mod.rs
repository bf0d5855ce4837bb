#![allow(dead_code)]

use events::app::{AppState, build_router};
use events::progress::{ProgressPipeline, RetryPolicy};
use events::store::memory::InMemoryStore;
use questline_bus::InMemoryBus;
use questline_trust::{ForwardedClaim, Role, encode};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub struct TestApp {
    pub router: axum::Router,
    pub store: InMemoryStore,
    pub bus: InMemoryBus,
    pub pipeline: Arc<ProgressPipeline>,
}

pub fn test_app() -> TestApp {
    let store = InMemoryStore::new();
    let bus = InMemoryBus::new();
    let pipeline = Arc::new(ProgressPipeline::new(
        Arc::new(store.clone()),
        Arc::new(bus.clone()),
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        },
    ));
    let router = build_router(AppState {
        store: Arc::new(store.clone()),
        pipeline: pipeline.clone(),
    });
    TestApp {
        router,
        store,
        bus,
        pipeline,
    }
}

/// Trust header for a fresh principal with `role`.
pub fn principal(role: Role) -> (Uuid, String) {
    let principal_id = Uuid::new_v4();
    let claim = ForwardedClaim {
        principal_id,
        handle: format!("user-{principal_id}"),
        role,
        token_expiry: i64::MAX,
        token_id: Uuid::new_v4().to_string(),
    };
    (principal_id, encode(&claim).expect("encode claim"))
}

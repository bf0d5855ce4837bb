//! Event-service HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router (catalog, reward requests, saga endpoints, and the
//! bus ingest for `user.login`) and defines the shared handler state.
use crate::api;
use crate::progress::ProgressPipeline;
use crate::store::EventStore;
use axum::Router;
use axum::routing::{get, post};
use questline_bus::{MessageHandler, ingest_router, topics};
use questline_common::observability;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EventStore>,
    pub pipeline: Arc<ProgressPipeline>,
}

pub fn build_router(state: AppState) -> Router {
    let mut handlers: HashMap<String, Arc<dyn MessageHandler>> = HashMap::new();
    handlers.insert(topics::USER_LOGIN.to_string(), state.pipeline.clone());

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route(
            "/events",
            get(api::campaigns::list_campaigns).post(api::campaigns::create_campaign),
        )
        .route("/events/requests", get(api::requests::list_requests))
        .route(
            "/events/requests/:request_id",
            get(api::requests::get_request),
        )
        .route(
            "/events/requests/:request_id/decision",
            post(api::requests::decide_request),
        )
        .route(
            "/events/internal/users/:principal_id",
            axum::routing::delete(api::internal::delete_principal),
        )
        .route(
            "/events/internal/users/:principal_id/restore",
            post(api::internal::restore_principal),
        )
        .route("/events/:campaign_id", get(api::campaigns::get_campaign))
        .route(
            "/events/:campaign_id/deactivate",
            post(api::campaigns::deactivate_campaign),
        )
        .route(
            "/events/:campaign_id/rewards",
            get(api::campaigns::list_rewards).post(api::campaigns::create_reward),
        )
        .route(
            "/events/:campaign_id/requests",
            post(api::requests::create_request),
        )
        .with_state(state)
        .merge(ingest_router(handlers))
        .layer(observability::http_trace_layer())
}

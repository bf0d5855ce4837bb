//! Identity-service HTTP application wiring.
use crate::api;
use crate::saga::DeletionSaga;
use crate::session::SessionService;
use crate::store::PrincipalStore;
use axum::Router;
use axum::routing::{get, post, put};
use questline_bus::{MessageBus, MessageHandler, ingest_router, topics};
use questline_common::observability;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub principals: Arc<dyn PrincipalStore>,
    pub sessions: SessionService,
    pub bus: Arc<dyn MessageBus>,
    pub saga: Arc<DeletionSaga>,
}

pub fn build_router(state: AppState) -> Router {
    let mut handlers: HashMap<String, Arc<dyn MessageHandler>> = HashMap::new();
    handlers.insert(
        topics::USER_DELETION_REQUESTED.to_string(),
        state.saga.clone(),
    );

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/auth", axum::routing::delete(api::profile::delete_account))
        .route("/auth/duplicate", get(api::auth::duplicate))
        .route("/auth/register", post(api::auth::register))
        .route("/auth/login", post(api::auth::login))
        .route("/auth/logout", post(api::auth::logout))
        .route("/auth/refresh", post(api::auth::refresh))
        .route(
            "/auth/info",
            get(api::profile::get_info).put(api::profile::update_info),
        )
        .route("/auth/all-users", get(api::admin::list_principals))
        .route("/auth/roles", put(api::admin::assign_role))
        .route(
            "/internal/sessions/:token_id",
            get(api::internal::session_status),
        )
        .with_state(state)
        .merge(ingest_router(handlers))
        .layer(observability::http_trace_layer())
}

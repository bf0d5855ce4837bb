//! Endpoints for other services. Not routed by the gateway.
use crate::api::types::SessionStatus;
use crate::app::AppState;
use axum::Json;
use axum::extract::{Path, State};

pub(crate) async fn session_status(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> Json<SessionStatus> {
    Json(SessionStatus {
        revoked: state.sessions.is_revoked(&token_id).await,
    })
}

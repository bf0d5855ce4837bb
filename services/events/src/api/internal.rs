//! Service-to-service endpoints driven by the identity deletion saga.
//!
//! Both operations are idempotent: repeating a delete or a restore touches no
//! additional rows.
use crate::app::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use questline_common::error::{ApiError, api_internal};
use uuid::Uuid;

pub(crate) async fn delete_principal(
    State(state): State<AppState>,
    Path(principal_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let touched = state
        .store
        .soft_delete_principal(principal_id, Utc::now())
        .await
        .map_err(|err| api_internal("failed to delete principal records", &err))?;
    tracing::info!(
        %principal_id,
        progress = touched.progress,
        requests = touched.requests,
        "principal records soft-deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn restore_principal(
    State(state): State<AppState>,
    Path(principal_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let touched = state
        .store
        .restore_principal(principal_id)
        .await
        .map_err(|err| api_internal("failed to restore principal records", &err))?;
    tracing::info!(
        %principal_id,
        progress = touched.progress,
        requests = touched.requests,
        "principal records restored"
    );
    Ok(StatusCode::NO_CONTENT)
}

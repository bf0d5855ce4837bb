//! Caller's own profile and account deletion.
use crate::api::auth::validate_email;
use crate::api::types::DeletionAccepted;
use crate::app::AppState;
use crate::model::{PrincipalView, ProfilePatch};
use crate::store::StoreError;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use questline_bus::payloads::DeletionRequested;
use questline_bus::{emit, topics};
use questline_common::Forwarded;
use questline_common::error::{ApiError, api_conflict, api_internal, api_not_found};

pub(crate) async fn get_info(
    State(state): State<AppState>,
    Forwarded(claim): Forwarded,
) -> Result<Json<PrincipalView>, ApiError> {
    match state.principals.get_principal(claim.principal_id).await {
        Ok(principal) => Ok(Json(principal.view())),
        Err(StoreError::NotFound(_)) => Err(api_not_found("principal not found")),
        Err(err) => Err(api_internal("failed to load principal", &err)),
    }
}

pub(crate) async fn update_info(
    State(state): State<AppState>,
    Forwarded(claim): Forwarded,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<PrincipalView>, ApiError> {
    if let Some(email) = patch.email.as_deref() {
        validate_email(email)?;
    }
    match state
        .principals
        .update_profile(claim.principal_id, patch)
        .await
    {
        Ok(principal) => Ok(Json(principal.view())),
        Err(StoreError::NotFound(_)) => Err(api_not_found("principal not found")),
        Err(StoreError::Conflict(message)) => Err(api_conflict("already_exists", &message)),
        Err(err) => Err(api_internal("failed to update profile", &err)),
    }
}

/// Accepts the deletion and hands it to the saga through the bus.
pub(crate) async fn delete_account(
    State(state): State<AppState>,
    Forwarded(claim): Forwarded,
) -> Result<impl IntoResponse, ApiError> {
    let principal_id = claim.principal_id;
    match state.principals.get_principal(principal_id).await {
        Ok(_) => {}
        Err(StoreError::NotFound(_)) => return Err(api_not_found("principal not found")),
        Err(err) => return Err(api_internal("failed to load principal", &err)),
    }
    emit(
        state.bus.as_ref(),
        topics::USER_DELETION_REQUESTED,
        &principal_id.to_string(),
        &DeletionRequested { principal_id },
    )
    .await
    .map_err(|err| api_internal("failed to request deletion", &err))?;
    tracing::info!(%principal_id, "deletion requested");
    Ok((StatusCode::ACCEPTED, Json(DeletionAccepted { principal_id })))
}

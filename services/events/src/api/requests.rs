//! Reward request handlers.
//!
//! A USER only ever sees their own requests. Staff and auditors may list
//! everything and filter by principal.
use crate::api::types::{DecisionRequest, RequestListResponse, RequestQuery};
use crate::app::AppState;
use crate::model::{RequestFilter, RequestStatus, RewardRequest};
use crate::store::StoreError;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use questline_common::Forwarded;
use questline_common::error::{
    ApiError, api_conflict, api_forbidden, api_internal, api_not_found,
};
use questline_trust::Role;
use uuid::Uuid;

pub(crate) async fn create_request(
    State(state): State<AppState>,
    Forwarded(claim): Forwarded,
    Path(campaign_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    match state.store.get_campaign(campaign_id).await {
        Ok(_) => {}
        Err(StoreError::NotFound(_)) => return Err(api_not_found("campaign not found")),
        Err(err) => return Err(api_internal("failed to load campaign", &err)),
    }
    // Progress that already crossed the threshold approves on the spot.
    let eligible = state
        .store
        .get_progress(claim.principal_id, campaign_id)
        .await
        .map_err(|err| api_internal("failed to load progress", &err))?
        .is_some_and(|progress| progress.eligible);
    let status = if eligible {
        RequestStatus::Approved
    } else {
        RequestStatus::Pending
    };
    let request = RewardRequest::new(claim.principal_id, campaign_id, status);
    match state.store.create_reward_request(request).await {
        Ok(created) => Ok((StatusCode::CREATED, Json(created))),
        Err(StoreError::Conflict(_)) => Err(api_conflict(
            "already_exists",
            "reward request already exists for this campaign",
        )),
        Err(err) => Err(api_internal("failed to create reward request", &err)),
    }
}

pub(crate) async fn list_requests(
    State(state): State<AppState>,
    Forwarded(claim): Forwarded,
    Query(query): Query<RequestQuery>,
) -> Result<Json<RequestListResponse>, ApiError> {
    let principal_id = if claim.role == Role::User {
        Some(claim.principal_id)
    } else {
        query.principal_id
    };
    let filter = RequestFilter {
        principal_id,
        campaign_id: query.campaign_id,
        status: query.status,
    };
    let items = state
        .store
        .list_reward_requests(filter)
        .await
        .map_err(|err| api_internal("failed to list reward requests", &err))?;
    Ok(Json(RequestListResponse { items }))
}

pub(crate) async fn get_request(
    State(state): State<AppState>,
    Forwarded(claim): Forwarded,
    Path(request_id): Path<Uuid>,
) -> Result<Json<RewardRequest>, ApiError> {
    let request = match state.store.get_reward_request(request_id).await {
        Ok(request) => request,
        Err(StoreError::NotFound(_)) => return Err(api_not_found("reward request not found")),
        Err(err) => return Err(api_internal("failed to load reward request", &err)),
    };
    if claim.role == Role::User && !claim.is_owner(request.principal_id) {
        return Err(api_forbidden("reward request belongs to another principal"));
    }
    Ok(Json(request))
}

pub(crate) async fn decide_request(
    State(state): State<AppState>,
    Forwarded(claim): Forwarded,
    Path(request_id): Path<Uuid>,
    Json(body): Json<DecisionRequest>,
) -> Result<Json<RewardRequest>, ApiError> {
    if !claim.role.is_staff() {
        return Err(api_forbidden("operator or admin role required"));
    }
    match state
        .store
        .decide_reward_request(request_id, body.decision, claim.principal_id, body.reason)
        .await
    {
        Ok(request) => {
            tracing::info!(%request_id, status = ?request.status, "reward request decided");
            Ok(Json(request))
        }
        Err(StoreError::NotFound(_)) => Err(api_not_found("reward request not found")),
        Err(StoreError::Conflict(_)) => Err(api_conflict(
            "already_processed",
            "reward request was already processed",
        )),
        Err(err) => Err(api_internal("failed to decide reward request", &err)),
    }
}

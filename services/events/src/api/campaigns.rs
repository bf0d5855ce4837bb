//! Campaign and reward catalog handlers.
//!
//! Mutations are restricted to staff roles. The gateway enforces the same
//! rule; the check here covers callers that reach the service directly.
use crate::api::types::{
    CampaignCreateRequest, CampaignListResponse, CampaignQuery, RewardCreateRequest,
    RewardListResponse,
};
use crate::app::AppState;
use crate::model::{Campaign, Reward};
use crate::store::StoreError;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use questline_common::Forwarded;
use questline_common::error::{
    ApiError, api_conflict, api_forbidden, api_internal, api_not_found, api_validation_error,
};
use questline_trust::ForwardedClaim;
use uuid::Uuid;

fn require_staff(claim: &ForwardedClaim) -> Result<(), ApiError> {
    if claim.role.is_staff() {
        Ok(())
    } else {
        Err(api_forbidden("operator or admin role required"))
    }
}

pub(crate) async fn create_campaign(
    State(state): State<AppState>,
    Forwarded(claim): Forwarded,
    Json(body): Json<CampaignCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_staff(&claim)?;
    if body.name.trim().is_empty() {
        return Err(api_validation_error("name must not be empty"));
    }
    if body.end_at <= body.start_at {
        return Err(api_validation_error("end_at must be after start_at"));
    }
    if body.condition.required() == 0 {
        return Err(api_validation_error("condition threshold must be at least 1"));
    }
    let campaign = Campaign {
        id: Uuid::new_v4(),
        name: body.name.trim().to_string(),
        description: body.description,
        condition: body.condition,
        start_at: body.start_at,
        end_at: body.end_at,
        is_active: body.is_active,
        created_at: Utc::now(),
        deleted_at: None,
    };
    match state.store.create_campaign(campaign).await {
        Ok(created) => {
            tracing::info!(campaign_id = %created.id, operator = %claim.principal_id, "campaign created");
            Ok((StatusCode::CREATED, Json(created)))
        }
        Err(StoreError::Conflict(_)) => Err(api_conflict(
            "overlapping_campaign",
            "a campaign with this name already runs in that window",
        )),
        Err(err) => Err(api_internal("failed to create campaign", &err)),
    }
}

pub(crate) async fn list_campaigns(
    State(state): State<AppState>,
    Query(query): Query<CampaignQuery>,
) -> Result<Json<CampaignListResponse>, ApiError> {
    let items = state
        .store
        .list_campaigns(query.active)
        .await
        .map_err(|err| api_internal("failed to list campaigns", &err))?;
    Ok(Json(CampaignListResponse { items }))
}

pub(crate) async fn get_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<Campaign>, ApiError> {
    match state.store.get_campaign(campaign_id).await {
        Ok(campaign) => Ok(Json(campaign)),
        Err(StoreError::NotFound(_)) => Err(api_not_found("campaign not found")),
        Err(err) => Err(api_internal("failed to load campaign", &err)),
    }
}

pub(crate) async fn deactivate_campaign(
    State(state): State<AppState>,
    Forwarded(claim): Forwarded,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<Campaign>, ApiError> {
    require_staff(&claim)?;
    match state.store.deactivate_campaign(campaign_id).await {
        Ok(campaign) => Ok(Json(campaign)),
        Err(StoreError::NotFound(_)) => Err(api_not_found("campaign not found")),
        Err(err) => Err(api_internal("failed to deactivate campaign", &err)),
    }
}

pub(crate) async fn create_reward(
    State(state): State<AppState>,
    Forwarded(claim): Forwarded,
    Path(campaign_id): Path<Uuid>,
    Json(body): Json<RewardCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_staff(&claim)?;
    let reward = Reward {
        id: Uuid::new_v4(),
        campaign_id,
        kind: body.kind,
        details: body.details,
        created_at: Utc::now(),
        deleted_at: None,
    };
    match state.store.create_reward(reward).await {
        Ok(created) => Ok((StatusCode::CREATED, Json(created))),
        Err(StoreError::NotFound(_)) => Err(api_not_found("campaign not found")),
        Err(err) => Err(api_internal("failed to create reward", &err)),
    }
}

pub(crate) async fn list_rewards(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<RewardListResponse>, ApiError> {
    let items = state
        .store
        .list_rewards(campaign_id)
        .await
        .map_err(|err| api_internal("failed to list rewards", &err))?;
    Ok(Json(RewardListResponse { items }))
}

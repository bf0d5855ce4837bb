//! Administrator-only principal management.
use crate::api::types::{PrincipalListResponse, RoleAssignment};
use crate::app::AppState;
use crate::model::PrincipalView;
use crate::store::StoreError;
use axum::Json;
use axum::extract::State;
use questline_common::Forwarded;
use questline_common::error::{ApiError, api_forbidden, api_internal, api_not_found};
use questline_trust::{ForwardedClaim, Role};

fn require_admin(claim: &ForwardedClaim) -> Result<(), ApiError> {
    if claim.role == Role::Admin {
        Ok(())
    } else {
        Err(api_forbidden("admin role required"))
    }
}

pub(crate) async fn list_principals(
    State(state): State<AppState>,
    Forwarded(claim): Forwarded,
) -> Result<Json<PrincipalListResponse>, ApiError> {
    require_admin(&claim)?;
    let items = state
        .principals
        .list_principals()
        .await
        .map_err(|err| api_internal("failed to list principals", &err))?
        .iter()
        .map(|principal| principal.view())
        .collect();
    Ok(Json(PrincipalListResponse { items }))
}

pub(crate) async fn assign_role(
    State(state): State<AppState>,
    Forwarded(claim): Forwarded,
    Json(body): Json<RoleAssignment>,
) -> Result<Json<PrincipalView>, ApiError> {
    require_admin(&claim)?;
    match state.principals.set_role(body.principal_id, body.role).await {
        Ok(principal) => {
            tracing::info!(
                principal_id = %principal.id,
                role = %principal.role,
                admin = %claim.principal_id,
                "role assigned"
            );
            Ok(Json(principal.view()))
        }
        Err(StoreError::NotFound(_)) => Err(api_not_found("principal not found")),
        Err(err) => Err(api_internal("failed to assign role", &err)),
    }
}

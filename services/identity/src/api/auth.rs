//! Registration, login, and session lifecycle handlers.
use crate::api::types::{DuplicateQuery, DuplicateResponse, LoginRequest, RegisterRequest};
use crate::app::AppState;
use crate::model::Principal;
use crate::password::{hash_password, verify_password};
use crate::session::{IssuedSession, RenewedSession, SessionError, Subject};
use crate::store::StoreError;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use questline_bus::payloads::UserLogin;
use questline_bus::{emit, topics};
use questline_common::Forwarded;
use questline_common::error::{
    ApiError, api_conflict, api_internal, api_not_found, api_unauthorized, api_validation_error,
};
use questline_trust::Role;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_HANDLE_LEN: usize = 32;

fn validate_handle(handle: &str) -> Result<(), ApiError> {
    let valid = !handle.is_empty()
        && handle.len() <= MAX_HANDLE_LEN
        && handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(api_validation_error(
            "handle must be 1-32 characters of letters, digits, '_' or '-'",
        ))
    }
}

pub(crate) fn validate_email(email: &str) -> Result<(), ApiError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(api_validation_error("email address is invalid")),
    }
}

pub(crate) async fn duplicate(
    State(state): State<AppState>,
    Query(query): Query<DuplicateQuery>,
) -> Result<Json<DuplicateResponse>, ApiError> {
    let is_duplicate = state
        .principals
        .handle_exists(&query.handle)
        .await
        .map_err(|err| api_internal("failed to check handle", &err))?;
    Ok(Json(DuplicateResponse { is_duplicate }))
}

pub(crate) async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_handle(&body.handle)?;
    validate_email(&body.email)?;
    if body.password.len() < MIN_PASSWORD_LEN {
        return Err(api_validation_error("password must be at least 8 characters"));
    }
    let password = body.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| api_internal("password hashing task failed", &err))?
        .map_err(|err| api_internal("failed to hash password", &err))?;
    let principal = Principal {
        id: Uuid::new_v4(),
        handle: body.handle,
        email: body.email,
        password_hash,
        role: Role::User,
        profile: body.profile,
        created_at: Utc::now(),
        deleted_at: None,
    };
    match state.principals.create_principal(principal).await {
        Ok(created) => {
            tracing::info!(principal_id = %created.id, handle = %created.handle, "principal registered");
            Ok((StatusCode::CREATED, Json(created.view())))
        }
        Err(StoreError::Conflict(message)) => Err(api_conflict("already_exists", &message)),
        Err(err) => Err(api_internal("failed to register principal", &err)),
    }
}

pub(crate) async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<IssuedSession>, ApiError> {
    let principal = match state.principals.find_by_handle(&body.handle).await {
        Ok(principal) => principal,
        Err(StoreError::NotFound(_)) => return Err(api_unauthorized("invalid credentials")),
        Err(err) => return Err(api_internal("failed to load principal", &err)),
    };
    let hash = principal.password_hash.clone();
    let password = body.password;
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|err| api_internal("password verification task failed", &err))?;
    if !verified {
        tracing::info!(handle = %principal.handle, "login rejected");
        return Err(api_unauthorized("invalid credentials"));
    }

    let issued = state
        .sessions
        .issue(Subject {
            principal_id: principal.id,
            handle: &principal.handle,
            role: principal.role,
        })
        .await
        .map_err(|err| api_internal("failed to issue session", &err))?;

    // Progress tracking is best-effort; a bus outage does not block login.
    if let Err(err) = emit(
        state.bus.as_ref(),
        topics::USER_LOGIN,
        &principal.id.to_string(),
        &UserLogin {
            principal_id: principal.id,
        },
    )
    .await
    {
        tracing::warn!(principal_id = %principal.id, error = %err, "failed to publish user.login");
    }
    metrics::counter!("questline_identity_logins_total").increment(1);
    Ok(Json(issued))
}

pub(crate) async fn logout(
    State(state): State<AppState>,
    Forwarded(claim): Forwarded,
) -> StatusCode {
    state
        .sessions
        .revoke(&claim.handle, &claim.token_id, claim.token_expiry)
        .await;
    StatusCode::NO_CONTENT
}

pub(crate) async fn refresh(
    State(state): State<AppState>,
    Forwarded(claim): Forwarded,
) -> Result<Json<RenewedSession>, ApiError> {
    let principal = match state.principals.get_principal(claim.principal_id).await {
        Ok(principal) => principal,
        Err(StoreError::NotFound(_)) => return Err(api_not_found("principal not found")),
        Err(err) => return Err(api_internal("failed to load principal", &err)),
    };
    let subject = Subject {
        principal_id: principal.id,
        handle: &claim.handle,
        role: principal.role,
    };
    match state.sessions.renew(subject).await {
        Ok(renewed) => Ok(Json(renewed)),
        Err(SessionError::InvalidRenewalToken(_)) => {
            Err(api_unauthorized("no active renewal token"))
        }
        Err(err) => Err(api_internal("failed to renew session", &err)),
    }
}

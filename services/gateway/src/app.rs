//! Gateway HTTP application.
//!
//! Every request other than `/healthz` goes through [`dispatch`]: check the
//! path is canonical, resolve the service, match a route rule, authenticate,
//! check the role, forward.
use crate::auth::Authenticator;
use crate::error::GatewayError;
use crate::policy::{Access, PathViolation, RouteTable, check_path, service_key};
use crate::proxy::{MAX_BODY_BYTES, Upstreams, status_label};
use axum::Router;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use questline_common::observability;
use std::sync::Arc;

#[derive(Clone)]
pub struct GatewayState {
    pub routes: Arc<RouteTable>,
    pub auth: Authenticator,
    pub upstreams: Upstreams,
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .fallback(proxy_request)
        .with_state(state)
        .layer(observability::http_trace_layer())
}

async fn proxy_request(State(state): State<GatewayState>, request: Request) -> Response {
    let service = service_key(request.uri().path())
        .unwrap_or_default()
        .to_string();
    let response = match dispatch(&state, &service, request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    };
    let label = if state.upstreams.base_url(&service).is_some() {
        service
    } else {
        "unknown".to_string()
    };
    metrics::counter!(
        "questline_gateway_requests_total",
        "service" => label,
        "status" => status_label(response.status()),
    )
    .increment(1);
    response
}

async fn dispatch(
    state: &GatewayState,
    service: &str,
    request: Request,
) -> Result<Response, GatewayError> {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path();
    check_path(path).map_err(|violation| match violation {
        PathViolation::NotCanonical => {
            GatewayError::BadRequest(format!("path {path} is not in canonical form"))
        }
        PathViolation::Internal => {
            GatewayError::Forbidden(format!("{path} is not exposed through the gateway"))
        }
    })?;
    let base_url = state
        .upstreams
        .base_url(service)
        .ok_or_else(|| GatewayError::UnknownRoute(format!("no service for {path}")))?
        .to_string();
    let rule = state
        .routes
        .resolve(service, &parts.method, path)
        .ok_or_else(|| GatewayError::Forbidden(format!("no route rule admits {path}")))?;

    let claim = match &rule.access {
        Access::Public => None,
        access @ Access::Authenticated { .. } => {
            let claim = state.auth.authenticate(&parts.headers).await?;
            if !access.allows(claim.role) {
                tracing::info!(
                    principal_id = %claim.principal_id,
                    role = %claim.role,
                    prefix = %rule.prefix,
                    "role not permitted"
                );
                return Err(GatewayError::Forbidden(format!(
                    "role {} may not access {}",
                    claim.role, rule.prefix
                )));
            }
            Some(claim)
        }
    };

    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| GatewayError::BadRequest("request body too large".to_string()))?;
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or(path);
    state
        .upstreams
        .forward(
            &base_url,
            parts.method.clone(),
            path_and_query,
            &parts.headers,
            body,
            claim.as_ref(),
        )
        .await
}

use questline_common::error::{
    ApiError, api_forbidden, api_internal_message, api_unauthorized, api_unknown_route,
    api_upstream_failure, api_upstream_timeout, api_validation_error,
};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("unknown route: {0}")]
    UnknownRoute(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),
    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::UnknownRoute(message) => api_unknown_route(&message),
            GatewayError::BadRequest(message) => api_validation_error(&message),
            GatewayError::Unauthorized(message) => api_unauthorized(&message),
            GatewayError::Forbidden(message) => api_forbidden(&message),
            GatewayError::UpstreamFailure(message) => api_upstream_failure(&message),
            GatewayError::UpstreamTimeout(message) => api_upstream_timeout(&message),
            GatewayError::Internal(message) => {
                tracing::error!(error = %message, "gateway internal error");
                api_internal_message("internal gateway error")
            }
        }
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        ApiError::from(self).into_response()
    }
}

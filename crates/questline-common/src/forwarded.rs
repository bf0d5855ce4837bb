//! Extractor for the gateway-asserted identity.
//!
//! Handlers that take [`Forwarded`] get a decoded, typed claim. Requests
//! without the header (or with a malformed one) are rejected with 401 before
//! the handler runs.
use crate::error::{ApiError, api_unauthorized};
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use questline_trust::{ForwardedClaim, TRUST_HEADER, TrustError, decode_header};

#[derive(Debug, Clone)]
pub struct Forwarded(pub ForwardedClaim);

#[async_trait]
impl<S> FromRequestParts<S> for Forwarded
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(TRUST_HEADER)
            .and_then(|value| value.to_str().ok());
        match decode_header(raw) {
            Ok(claim) => Ok(Forwarded(claim)),
            Err(TrustError::MissingTrustToken) => Err(api_unauthorized("missing trust token")),
            Err(err) => {
                tracing::warn!(error = %err, "rejecting malformed trust token");
                Err(api_unauthorized("malformed trust token"))
            }
        }
    }
}

//! Trust header codec.
//!
//! The token is the claim's JSON text, percent-encoded so it is always a
//! valid header value. It carries no signature.
use crate::{ForwardedClaim, TrustError, TrustResult};
use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Header carrying the encoded [`ForwardedClaim`] on internal hops.
pub const TRUST_HEADER: &str = "x-forwarded-user";

pub fn encode(claim: &ForwardedClaim) -> TrustResult<String> {
    let json = serde_json::to_string(claim)
        .map_err(|err| TrustError::MalformedTrustToken(err.to_string()))?;
    Ok(utf8_percent_encode(&json, NON_ALPHANUMERIC).to_string())
}

pub fn decode(token: &str) -> TrustResult<ForwardedClaim> {
    let json = percent_decode_str(token)
        .decode_utf8()
        .map_err(|err| TrustError::MalformedTrustToken(err.to_string()))?;
    serde_json::from_str(&json).map_err(|err| TrustError::MalformedTrustToken(err.to_string()))
}

/// Decode an optional header value; absent or blank means no claim was sent.
pub fn decode_header(value: Option<&str>) -> TrustResult<ForwardedClaim> {
    match value.map(str::trim) {
        None | Some("") => Err(TrustError::MissingTrustToken),
        Some(token) => decode(token),
    }
}

use crate::Role;
use crate::session::SessionClaims;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity asserted by the gateway to internal services.
///
/// Unknown fields are rejected so a decoded claim is exactly what the gateway
/// produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ForwardedClaim {
    pub principal_id: Uuid,
    pub handle: String,
    pub role: Role,
    /// Session expiry as unix seconds.
    pub token_expiry: i64,
    pub token_id: String,
}

impl ForwardedClaim {
    pub fn from_session(claims: &SessionClaims) -> Self {
        Self {
            principal_id: claims.sub,
            handle: claims.handle.clone(),
            role: claims.role,
            token_expiry: claims.exp,
            token_id: claims.jti.clone(),
        }
    }

    pub fn is_owner(&self, principal_id: Uuid) -> bool {
        self.principal_id == principal_id
    }
}

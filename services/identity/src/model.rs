//! Principal model.
use chrono::{DateTime, Utc};
use questline_trust::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registered account. The credential hash never leaves the service; use
/// [`PrincipalView`] for responses.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub id: Uuid,
    pub handle: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub profile: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Principal {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn view(&self) -> PrincipalView {
        PrincipalView {
            id: self.id,
            handle: self.handle.clone(),
            email: self.email.clone(),
            role: self.role,
            profile: self.profile.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalView {
    pub id: Uuid,
    pub handle: String,
    pub email: String,
    pub role: Role,
    pub profile: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub email: Option<String>,
    pub profile: Option<serde_json::Map<String, serde_json::Value>>,
}

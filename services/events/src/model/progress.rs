use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressKey {
    pub principal_id: Uuid,
    pub campaign_id: Uuid,
}

/// Per-(principal, campaign) counter.
///
/// `eligible` only ever flips from false to true; once set, further logins
/// leave the record untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub principal_id: Uuid,
    pub campaign_id: Uuid,
    pub progress: u32,
    pub required: u32,
    pub eligible: bool,
    pub last_update: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Progress {
    pub fn key(&self) -> ProgressKey {
        ProgressKey {
            principal_id: self.principal_id,
            campaign_id: self.campaign_id,
        }
    }

    pub fn first(principal_id: Uuid, campaign_id: Uuid, required: u32, at: DateTime<Utc>) -> Self {
        Self {
            principal_id,
            campaign_id,
            progress: 1,
            required,
            eligible: 1 >= required,
            last_update: at,
            deleted_at: None,
        }
    }

    /// Count one more qualifying event. No-op once eligible.
    pub fn advance(&mut self, at: DateTime<Utc>) {
        if self.eligible {
            return;
        }
        self.progress += 1;
        self.last_update = at;
        self.eligible = self.progress >= self.required;
    }
}

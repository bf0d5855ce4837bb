//! Message payloads, serialized with camelCase field names.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLogin {
    pub principal_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionRequested {
    pub principal_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionSucceeded {
    pub principal_id: Uuid,
}

/// Outcome of one compensation run during a failed deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensationOutcome {
    pub step: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionFailed {
    pub principal_id: Uuid,
    pub reason: String,
    #[serde(default)]
    pub compensation: Vec<CompensationOutcome>,
}

impl DeletionFailed {
    /// True when every compensation that ran succeeded.
    pub fn fully_compensated(&self) -> bool {
        self.compensation.iter().all(|outcome| outcome.ok)
    }
}

/// Published on both the failure and dead-letter topics after retries run out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressFailure {
    pub principal_id: Uuid,
    /// `None` when the campaign lookup itself failed.
    pub campaign_id: Option<Uuid>,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

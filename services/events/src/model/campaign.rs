use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Completion condition of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
    /// Completed after `days` qualifying logins.
    ConsecutiveLogin { days: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionKind {
    ConsecutiveLogin,
}

impl Condition {
    pub fn kind(&self) -> ConditionKind {
        match self {
            Condition::ConsecutiveLogin { .. } => ConditionKind::ConsecutiveLogin,
        }
    }

    /// Counter value at which a principal becomes eligible.
    pub fn required(&self) -> u32 {
        match self {
            Condition::ConsecutiveLogin { days } => *days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub condition: Condition,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Active, not deleted, and `at` falls inside `[start_at, end_at]`.
    pub fn is_running_at(&self, at: DateTime<Utc>) -> bool {
        self.is_active && self.deleted_at.is_none() && self.start_at <= at && at <= self.end_at
    }

    /// Same name and condition kind with intersecting windows.
    pub fn overlaps(&self, other: &Campaign) -> bool {
        self.deleted_at.is_none()
            && other.deleted_at.is_none()
            && self.name == other.name
            && self.condition.kind() == other.condition.kind()
            && self.start_at < other.end_at
            && other.start_at < self.end_at
    }
}

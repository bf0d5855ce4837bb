use crate::model::{Campaign, Condition, Decision, RequestStatus, Reward, RewardKind, RewardRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CampaignCreateRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub condition: Condition,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct CampaignQuery {
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignListResponse {
    pub items: Vec<Campaign>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RewardCreateRequest {
    pub kind: RewardKind,
    #[serde(default)]
    pub details: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RewardListResponse {
    pub items: Vec<Reward>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestQuery {
    pub principal_id: Option<Uuid>,
    pub campaign_id: Option<Uuid>,
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestListResponse {
    pub items: Vec<RewardRequest>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DecisionRequest {
    pub decision: Decision,
    #[serde(default)]
    pub reason: Option<String>,
}

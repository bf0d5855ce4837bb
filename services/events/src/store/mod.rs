use crate::model::{
    Campaign, ConditionKind, Decision, Progress, RequestFilter, Reward, RewardRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// Transient failure; callers may retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Rows touched by a per-principal soft-delete or restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PrincipalRecords {
    pub progress: usize,
    pub requests: usize,
}

#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Fails with `Conflict` when a live campaign overlaps.
    async fn create_campaign(&self, campaign: Campaign) -> StoreResult<Campaign>;
    async fn get_campaign(&self, id: Uuid) -> StoreResult<Campaign>;
    async fn list_campaigns(&self, active_only: bool) -> StoreResult<Vec<Campaign>>;
    async fn deactivate_campaign(&self, id: Uuid) -> StoreResult<Campaign>;

    async fn create_reward(&self, reward: Reward) -> StoreResult<Reward>;
    async fn list_rewards(&self, campaign_id: Uuid) -> StoreResult<Vec<Reward>>;
}

/// Operations used by the progress pipeline.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Running campaigns of `kind` whose window contains `at`.
    async fn active_campaigns(
        &self,
        kind: ConditionKind,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<Campaign>>;

    /// Create the record with progress 1, leave an eligible record untouched,
    /// or advance the counter. Read-check-write happens under one lock.
    async fn upsert_login_progress(
        &self,
        principal_id: Uuid,
        campaign_id: Uuid,
        required: u32,
        at: DateTime<Utc>,
    ) -> StoreResult<Progress>;

    async fn get_progress(
        &self,
        principal_id: Uuid,
        campaign_id: Uuid,
    ) -> StoreResult<Option<Progress>>;

    /// Approve the principal's pending request for the campaign, if any.
    /// Terminal requests are left as they are.
    async fn bulk_approve(
        &self,
        principal_id: Uuid,
        campaign_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<RewardRequest>>;
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Fails with `Conflict` when the pair already has a live request.
    async fn create_reward_request(&self, request: RewardRequest) -> StoreResult<RewardRequest>;
    async fn get_reward_request(&self, id: Uuid) -> StoreResult<RewardRequest>;
    async fn list_reward_requests(&self, filter: RequestFilter) -> StoreResult<Vec<RewardRequest>>;
    /// Fails with `Conflict` when the request is no longer pending.
    async fn decide_reward_request(
        &self,
        id: Uuid,
        decision: Decision,
        operator_id: Uuid,
        reason: Option<String>,
    ) -> StoreResult<RewardRequest>;
}

#[async_trait]
pub trait RetentionStore: Send + Sync {
    async fn soft_delete_principal(
        &self,
        principal_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<PrincipalRecords>;
    async fn restore_principal(&self, principal_id: Uuid) -> StoreResult<PrincipalRecords>;
    /// Hard-delete rows soft-deleted before `cutoff`.
    async fn purge_deleted(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;
}

pub trait EventStore: CampaignStore + ProgressStore + RequestStore + RetentionStore {
    fn backend_name(&self) -> &'static str;
}

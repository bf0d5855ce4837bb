//! In-memory event store.
//!
//! # Durability and consistency
//! - **Not durable**: state is lost on restart.
//! - Each entity map sits behind its own `tokio::sync::RwLock`. Mutations that
//!   must be atomic (progress upsert, request creation, bulk approval) run
//!   entirely under the write lock of the map they touch.
//! - Operations spanning progress and requests take the locks in that order.
use super::{
    CampaignStore, EventStore, PrincipalRecords, ProgressStore, RequestStore, RetentionStore,
    StoreError, StoreResult,
};
use crate::model::{
    Campaign, ConditionKind, Decision, Progress, ProgressKey, RequestFilter, RequestStatus,
    Reward, RewardRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    campaigns: Arc<RwLock<HashMap<Uuid, Campaign>>>,
    rewards: Arc<RwLock<HashMap<Uuid, Reward>>>,
    progress: Arc<RwLock<HashMap<ProgressKey, Progress>>>,
    requests: Arc<RwLock<HashMap<Uuid, RewardRequest>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl CampaignStore for InMemoryStore {
    async fn create_campaign(&self, campaign: Campaign) -> StoreResult<Campaign> {
        let mut campaigns = self.campaigns.write().await;
        if campaigns.values().any(|existing| existing.overlaps(&campaign)) {
            return Err(StoreError::Conflict(format!(
                "campaign {} overlaps an existing window",
                campaign.name
            )));
        }
        campaigns.insert(campaign.id, campaign.clone());
        metrics::gauge!("questline_events_campaigns").set(campaigns.len() as f64);
        Ok(campaign)
    }

    async fn get_campaign(&self, id: Uuid) -> StoreResult<Campaign> {
        self.campaigns
            .read()
            .await
            .get(&id)
            .filter(|campaign| campaign.deleted_at.is_none())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("campaign {id}")))
    }

    async fn list_campaigns(&self, active_only: bool) -> StoreResult<Vec<Campaign>> {
        let items = self
            .campaigns
            .read()
            .await
            .values()
            .filter(|c| c.deleted_at.is_none() && (!active_only || c.is_active))
            .cloned()
            .collect();
        Ok(sorted_by(items, |c: &Campaign| c.start_at))
    }

    async fn deactivate_campaign(&self, id: Uuid) -> StoreResult<Campaign> {
        let mut campaigns = self.campaigns.write().await;
        let campaign = campaigns
            .get_mut(&id)
            .filter(|campaign| campaign.deleted_at.is_none())
            .ok_or_else(|| StoreError::NotFound(format!("campaign {id}")))?;
        campaign.is_active = false;
        Ok(campaign.clone())
    }

    async fn create_reward(&self, reward: Reward) -> StoreResult<Reward> {
        self.get_campaign(reward.campaign_id).await?;
        self.rewards.write().await.insert(reward.id, reward.clone());
        Ok(reward)
    }

    async fn list_rewards(&self, campaign_id: Uuid) -> StoreResult<Vec<Reward>> {
        let items = self
            .rewards
            .read()
            .await
            .values()
            .filter(|r| r.campaign_id == campaign_id && r.deleted_at.is_none())
            .cloned()
            .collect();
        Ok(sorted_by(items, |r: &Reward| r.created_at))
    }
}

#[async_trait]
impl ProgressStore for InMemoryStore {
    async fn active_campaigns(
        &self,
        kind: ConditionKind,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<Campaign>> {
        let items = self
            .campaigns
            .read()
            .await
            .values()
            .filter(|c| c.condition.kind() == kind && c.is_running_at(at))
            .cloned()
            .collect();
        Ok(sorted_by(items, |c: &Campaign| c.start_at))
    }

    async fn upsert_login_progress(
        &self,
        principal_id: Uuid,
        campaign_id: Uuid,
        required: u32,
        at: DateTime<Utc>,
    ) -> StoreResult<Progress> {
        let key = ProgressKey {
            principal_id,
            campaign_id,
        };
        let mut progress = self.progress.write().await;
        match progress.get_mut(&key) {
            Some(record) if record.deleted_at.is_none() => {
                record.advance(at);
                Ok(record.clone())
            }
            // A soft-deleted record belongs to a principal under deletion.
            Some(_) => Err(StoreError::Conflict(format!(
                "progress for principal {principal_id} is deleted"
            ))),
            None => {
                let record = Progress::first(principal_id, campaign_id, required, at);
                progress.insert(key, record.clone());
                Ok(record)
            }
        }
    }

    async fn get_progress(
        &self,
        principal_id: Uuid,
        campaign_id: Uuid,
    ) -> StoreResult<Option<Progress>> {
        let key = ProgressKey {
            principal_id,
            campaign_id,
        };
        Ok(self
            .progress
            .read()
            .await
            .get(&key)
            .filter(|record| record.deleted_at.is_none())
            .cloned())
    }

    async fn bulk_approve(
        &self,
        principal_id: Uuid,
        campaign_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<RewardRequest>> {
        let mut requests = self.requests.write().await;
        let pending = requests.values_mut().find(|r| {
            r.principal_id == principal_id
                && r.campaign_id == campaign_id
                && r.deleted_at.is_none()
                && r.status == RequestStatus::Pending
        });
        Ok(pending.map(|request| {
            request.status = RequestStatus::Approved;
            request.processed_at = Some(at);
            request.clone()
        }))
    }
}

#[async_trait]
impl RequestStore for InMemoryStore {
    async fn create_reward_request(&self, request: RewardRequest) -> StoreResult<RewardRequest> {
        let mut requests = self.requests.write().await;
        let exists = requests.values().any(|r| {
            r.principal_id == request.principal_id
                && r.campaign_id == request.campaign_id
                && r.deleted_at.is_none()
        });
        if exists {
            return Err(StoreError::Conflict(format!(
                "reward request for campaign {} already exists",
                request.campaign_id
            )));
        }
        requests.insert(request.id, request.clone());
        metrics::gauge!("questline_events_reward_requests").set(requests.len() as f64);
        Ok(request)
    }

    async fn get_reward_request(&self, id: Uuid) -> StoreResult<RewardRequest> {
        self.requests
            .read()
            .await
            .get(&id)
            .filter(|r| r.deleted_at.is_none())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("reward request {id}")))
    }

    async fn list_reward_requests(&self, filter: RequestFilter) -> StoreResult<Vec<RewardRequest>> {
        let items = self
            .requests
            .read()
            .await
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        Ok(sorted_by(items, |r: &RewardRequest| r.requested_at))
    }

    async fn decide_reward_request(
        &self,
        id: Uuid,
        decision: Decision,
        operator_id: Uuid,
        reason: Option<String>,
    ) -> StoreResult<RewardRequest> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(&id)
            .filter(|r| r.deleted_at.is_none())
            .ok_or_else(|| StoreError::NotFound(format!("reward request {id}")))?;
        if request.status.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "reward request {id} already processed"
            )));
        }
        request.status = decision.status();
        request.processed_at = Some(Utc::now());
        request.operator_id = Some(operator_id);
        request.reason = reason;
        Ok(request.clone())
    }
}

#[async_trait]
impl RetentionStore for InMemoryStore {
    async fn soft_delete_principal(
        &self,
        principal_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<PrincipalRecords> {
        let mut progress = self.progress.write().await;
        let mut requests = self.requests.write().await;
        let mut touched = PrincipalRecords::default();
        for record in progress
            .values_mut()
            .filter(|p| p.principal_id == principal_id && p.deleted_at.is_none())
        {
            record.deleted_at = Some(at);
            touched.progress += 1;
        }
        for request in requests
            .values_mut()
            .filter(|r| r.principal_id == principal_id && r.deleted_at.is_none())
        {
            request.deleted_at = Some(at);
            touched.requests += 1;
        }
        Ok(touched)
    }

    async fn restore_principal(&self, principal_id: Uuid) -> StoreResult<PrincipalRecords> {
        let mut progress = self.progress.write().await;
        let mut requests = self.requests.write().await;
        let mut touched = PrincipalRecords::default();
        for record in progress
            .values_mut()
            .filter(|p| p.principal_id == principal_id && p.deleted_at.is_some())
        {
            record.deleted_at = None;
            touched.progress += 1;
        }
        for request in requests
            .values_mut()
            .filter(|r| r.principal_id == principal_id && r.deleted_at.is_some())
        {
            request.deleted_at = None;
            touched.requests += 1;
        }
        Ok(touched)
    }

    async fn purge_deleted(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let expired = |deleted_at: Option<DateTime<Utc>>| deleted_at.is_some_and(|at| at < cutoff);
        let mut purged = 0;
        {
            let mut campaigns = self.campaigns.write().await;
            let before = campaigns.len();
            campaigns.retain(|_, c| !expired(c.deleted_at));
            purged += before - campaigns.len();
        }
        {
            let mut rewards = self.rewards.write().await;
            let before = rewards.len();
            rewards.retain(|_, r| !expired(r.deleted_at));
            purged += before - rewards.len();
        }
        {
            let mut progress = self.progress.write().await;
            let before = progress.len();
            progress.retain(|_, p| !expired(p.deleted_at));
            purged += before - progress.len();
        }
        {
            let mut requests = self.requests.write().await;
            let before = requests.len();
            requests.retain(|_, r| !expired(r.deleted_at));
            purged += before - requests.len();
        }
        Ok(purged)
    }
}

impl EventStore for InMemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

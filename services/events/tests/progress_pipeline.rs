use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use events::model::{
    Campaign, Condition, ConditionKind, Progress, RequestStatus, RewardRequest,
};
use events::progress::{CampaignOutcome, ProgressPipeline, RetryPolicy};
use events::store::memory::InMemoryStore;
use events::store::{CampaignStore, ProgressStore, RequestStore, StoreError, StoreResult};
use questline_bus::payloads::ProgressFailure;
use questline_bus::{InMemoryBus, topics};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use uuid::Uuid;

fn running_campaign(name: &str, days: u32, start_offset_hours: i64) -> Campaign {
    let now = Utc::now();
    Campaign {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        condition: Condition::ConsecutiveLogin { days },
        start_at: now - Duration::hours(start_offset_hours),
        end_at: now + Duration::days(3),
        is_active: true,
        created_at: now,
        deleted_at: None,
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: std::time::Duration::from_millis(1),
    }
}

/// Fails upserts for one campaign a fixed number of times, and campaign
/// lookups a separate number of times.
struct FlakyStore {
    inner: InMemoryStore,
    failing_campaign: Uuid,
    failures_left: AtomicU32,
    attempts: AtomicU32,
    lookup_failures_left: AtomicU32,
    lookups: AtomicU32,
}

#[async_trait]
impl ProgressStore for FlakyStore {
    async fn active_campaigns(
        &self,
        kind: ConditionKind,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<Campaign>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let left = self.lookup_failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.lookup_failures_left.store(left - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("catalog not reachable".to_string()));
        }
        self.inner.active_campaigns(kind, at).await
    }

    async fn upsert_login_progress(
        &self,
        principal_id: Uuid,
        campaign_id: Uuid,
        required: u32,
        at: DateTime<Utc>,
    ) -> StoreResult<Progress> {
        if campaign_id == self.failing_campaign {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("primary not reachable".to_string()));
            }
        }
        self.inner
            .upsert_login_progress(principal_id, campaign_id, required, at)
            .await
    }

    async fn get_progress(
        &self,
        principal_id: Uuid,
        campaign_id: Uuid,
    ) -> StoreResult<Option<Progress>> {
        self.inner.get_progress(principal_id, campaign_id).await
    }

    async fn bulk_approve(
        &self,
        principal_id: Uuid,
        campaign_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<RewardRequest>> {
        self.inner.bulk_approve(principal_id, campaign_id, at).await
    }
}

async fn seeded(failures: u32) -> (Arc<FlakyStore>, Campaign, Campaign) {
    let inner = InMemoryStore::new();
    let broken = inner
        .create_campaign(running_campaign("broken", 3, 2))
        .await
        .expect("broken");
    let healthy = inner
        .create_campaign(running_campaign("healthy", 3, 1))
        .await
        .expect("healthy");
    let store = Arc::new(FlakyStore {
        inner,
        failing_campaign: broken.id,
        failures_left: AtomicU32::new(failures),
        attempts: AtomicU32::new(0),
        lookup_failures_left: AtomicU32::new(0),
        lookups: AtomicU32::new(0),
    });
    (store, broken, healthy)
}

#[tokio::test]
async fn exhausted_retries_emit_one_failure_and_one_dead_letter() {
    let (store, broken, healthy) = seeded(u32::MAX).await;
    let bus = InMemoryBus::new();
    let pipeline = ProgressPipeline::new(store.clone(), Arc::new(bus.clone()), fast_retry());
    let principal = Uuid::new_v4();

    let outcomes = pipeline.on_login(principal).await.expect("login");

    assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(outcomes.len(), 2);
    assert!(matches!(
        &outcomes[0],
        CampaignOutcome::DeadLettered { campaign_id, .. } if *campaign_id == broken.id
    ));
    assert!(matches!(&outcomes[1], CampaignOutcome::Advanced(p) if p.campaign_id == healthy.id));

    let failed = bus.published(topics::PROGRESS_FAILED);
    let dlq = bus.published(topics::PROGRESS_DLQ);
    assert_eq!(failed.len(), 1);
    assert_eq!(dlq.len(), 1);
    let payload: ProgressFailure = dlq[0].decode().expect("payload");
    assert_eq!(payload.principal_id, principal);
    assert_eq!(payload.campaign_id, Some(broken.id));
    assert!(payload.error.contains("primary not reachable"));
    assert_eq!(failed[0].payload, dlq[0].payload);

    let healthy_progress = store
        .get_progress(principal, healthy.id)
        .await
        .expect("get")
        .expect("healthy progress");
    assert_eq!(healthy_progress.progress, 1);
}

#[tokio::test]
async fn failed_campaign_lookup_is_retried_then_dead_lettered() {
    let (store, _, _) = seeded(0).await;
    store.lookup_failures_left.store(u32::MAX, Ordering::SeqCst);
    let bus = InMemoryBus::new();
    let pipeline = ProgressPipeline::new(store.clone(), Arc::new(bus.clone()), fast_retry());
    let principal = Uuid::new_v4();

    let err = pipeline.on_login(principal).await.expect_err("lookup fails");
    assert!(matches!(err, StoreError::Unavailable(_)));
    assert_eq!(store.lookups.load(Ordering::SeqCst), 3);

    let failed = bus.published(topics::PROGRESS_FAILED);
    let dlq = bus.published(topics::PROGRESS_DLQ);
    assert_eq!(failed.len(), 1);
    assert_eq!(dlq.len(), 1);
    let payload: ProgressFailure = dlq[0].decode().expect("payload");
    assert_eq!(payload.principal_id, principal);
    assert_eq!(payload.campaign_id, None);
    assert!(payload.error.contains("catalog not reachable"));
}

#[tokio::test]
async fn transient_lookup_failure_still_processes_the_login() {
    let (store, _, healthy) = seeded(0).await;
    store.lookup_failures_left.store(1, Ordering::SeqCst);
    let bus = InMemoryBus::new();
    let pipeline = ProgressPipeline::new(store.clone(), Arc::new(bus.clone()), fast_retry());
    let principal = Uuid::new_v4();

    let outcomes = pipeline.on_login(principal).await.expect("login");
    assert_eq!(outcomes.len(), 2);
    assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
    assert!(bus.published(topics::PROGRESS_DLQ).is_empty());
    assert!(
        store
            .get_progress(principal, healthy.id)
            .await
            .expect("get")
            .is_some()
    );
}

#[tokio::test]
async fn transient_failures_recover_without_dead_letter() {
    let (store, broken, _) = seeded(2).await;
    let bus = InMemoryBus::new();
    let pipeline = ProgressPipeline::new(store.clone(), Arc::new(bus.clone()), fast_retry());
    let principal = Uuid::new_v4();

    pipeline.on_login(principal).await.expect("login");

    assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    assert!(bus.published(topics::PROGRESS_DLQ).is_empty());
    assert!(bus.published(topics::PROGRESS_FAILED).is_empty());
    let progress = store
        .get_progress(principal, broken.id)
        .await
        .expect("get")
        .expect("progress");
    assert_eq!(progress.progress, 1);
}

#[tokio::test]
async fn repeated_logins_cap_counter_and_approve_once() {
    let store = InMemoryStore::new();
    let campaign = store
        .create_campaign(running_campaign("streak", 3, 1))
        .await
        .expect("campaign");
    let principal = Uuid::new_v4();
    let request = store
        .create_reward_request(RewardRequest::new(
            principal,
            campaign.id,
            RequestStatus::Pending,
        ))
        .await
        .expect("request");
    let bus = InMemoryBus::new();
    let pipeline = ProgressPipeline::new(
        Arc::new(store.clone()),
        Arc::new(bus.clone()),
        fast_retry(),
    );

    let mut approvals = Vec::new();
    for _ in 0..6 {
        for outcome in pipeline.on_login(principal).await.expect("login") {
            if let CampaignOutcome::Eligible {
                approved: Some(id),
                ..
            } = outcome
            {
                approvals.push(id);
            }
        }
    }

    assert_eq!(approvals, vec![request.id]);
    let progress = store
        .get_progress(principal, campaign.id)
        .await
        .expect("get")
        .expect("progress");
    assert_eq!(progress.progress, 3);
    assert!(progress.eligible);
    let stored = store.get_reward_request(request.id).await.expect("request");
    assert_eq!(stored.status, RequestStatus::Approved);
}

#[tokio::test]
async fn campaigns_outside_their_window_are_ignored() {
    let store = InMemoryStore::new();
    let mut future = running_campaign("later", 1, 0);
    future.start_at = Utc::now() + Duration::days(1);
    future.end_at = Utc::now() + Duration::days(2);
    store.create_campaign(future).await.expect("future");
    let pipeline = ProgressPipeline::new(
        Arc::new(store.clone()),
        Arc::new(InMemoryBus::new()),
        fast_retry(),
    );
    let outcomes = pipeline.on_login(Uuid::new_v4()).await.expect("login");
    assert!(outcomes.is_empty());
}

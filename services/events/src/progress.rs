//! Login-driven progress pipeline.
//!
//! # Overview
//! For every `user.login` message the pipeline walks the running
//! consecutive-login campaigns one at a time. Each campaign gets an
//! idempotent progress upsert and, once the principal is eligible, a bulk
//! approval of their pending reward request.
//!
//! # Failure handling
//! A campaign step is attempted up to `max_attempts` times with exponential
//! backoff (`base_delay * 2^(attempt-1)` between attempts). When attempts run
//! out, one message is published on `event.progress.failed` and one on
//! `event.progress.dlq`, and the next campaign is processed. The campaign
//! lookup that starts a login retries the same way; when it gives up, the
//! login is dead-lettered without a campaign id.
use crate::model::{Campaign, ConditionKind, Progress};
use crate::store::{ProgressStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use questline_bus::payloads::{ProgressFailure, UserLogin};
use questline_bus::{Envelope, MessageBus, MessageHandler, emit, topics};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// What happened to one campaign for one login.
#[derive(Debug, Clone, PartialEq)]
pub enum CampaignOutcome {
    Advanced(Progress),
    /// Eligible; `approved` is the request flipped by this login, if any.
    Eligible {
        progress: Progress,
        approved: Option<Uuid>,
    },
    DeadLettered {
        campaign_id: Uuid,
        error: String,
    },
}

pub struct ProgressPipeline {
    store: Arc<dyn ProgressStore>,
    bus: Arc<dyn MessageBus>,
    retry: RetryPolicy,
}

impl ProgressPipeline {
    pub fn new(store: Arc<dyn ProgressStore>, bus: Arc<dyn MessageBus>, retry: RetryPolicy) -> Self {
        Self { store, bus, retry }
    }

    #[tracing::instrument(skip_all, fields(%principal_id))]
    pub async fn on_login(&self, principal_id: Uuid) -> Result<Vec<CampaignOutcome>, StoreError> {
        let now = Utc::now();
        let lookup = self
            .retrying(None, || {
                self.store
                    .active_campaigns(ConditionKind::ConsecutiveLogin, now)
            })
            .await;
        let campaigns = match lookup {
            Ok(campaigns) => campaigns,
            Err(err) => {
                self.dead_letter(principal_id, None, &err.to_string()).await;
                return Err(err);
            }
        };
        let mut outcomes = Vec::with_capacity(campaigns.len());
        for campaign in &campaigns {
            outcomes.push(self.process_campaign(principal_id, campaign).await);
        }
        Ok(outcomes)
    }

    async fn process_campaign(&self, principal_id: Uuid, campaign: &Campaign) -> CampaignOutcome {
        match self
            .retrying(Some(campaign.id), || self.apply(principal_id, campaign))
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                let error = err.to_string();
                self.dead_letter(principal_id, Some(campaign.id), &error).await;
                CampaignOutcome::DeadLettered {
                    campaign_id: campaign.id,
                    error,
                }
            }
        }
    }

    async fn retrying<T, F, Fut>(&self, campaign_id: Option<Uuid>, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts => {
                    metrics::counter!("questline_progress_retries_total").increment(1);
                    tracing::warn!(
                        campaign_id = ?campaign_id,
                        attempt,
                        max_attempts,
                        error = %err,
                        "progress update failed, retrying"
                    );
                    tokio::time::sleep(self.retry.backoff(attempt)).await;
                }
                Err(err) => {
                    tracing::error!(
                        campaign_id = ?campaign_id,
                        attempts = attempt,
                        error = %err,
                        "progress update exhausted retries"
                    );
                    return Err(err);
                }
            }
        }
    }

    async fn apply(
        &self,
        principal_id: Uuid,
        campaign: &Campaign,
    ) -> Result<CampaignOutcome, StoreError> {
        let now = Utc::now();
        let progress = self
            .store
            .upsert_login_progress(principal_id, campaign.id, campaign.condition.required(), now)
            .await?;
        if !progress.eligible {
            return Ok(CampaignOutcome::Advanced(progress));
        }
        let approved = self
            .store
            .bulk_approve(principal_id, campaign.id, now)
            .await?
            .map(|request| request.id);
        if let Some(request_id) = approved {
            tracing::info!(campaign_id = %campaign.id, %request_id, "reward request auto-approved");
        }
        Ok(CampaignOutcome::Eligible { progress, approved })
    }

    async fn dead_letter(&self, principal_id: Uuid, campaign_id: Option<Uuid>, error: &str) {
        metrics::counter!("questline_progress_dlq_total").increment(1);
        let failure = ProgressFailure {
            principal_id,
            campaign_id,
            error: error.to_string(),
            timestamp: Utc::now(),
        };
        let key = principal_id.to_string();
        for topic in [topics::PROGRESS_FAILED, topics::PROGRESS_DLQ] {
            if let Err(err) = emit(self.bus.as_ref(), topic, &key, &failure).await {
                // The log line is the last record of this failure.
                tracing::error!(
                    topic,
                    %principal_id,
                    campaign_id = ?campaign_id,
                    failure = %error,
                    error = %err,
                    "failed to publish progress failure"
                );
            }
        }
    }
}

#[async_trait]
impl MessageHandler for ProgressPipeline {
    async fn handle(&self, envelope: Envelope) -> anyhow::Result<()> {
        let login: UserLogin = envelope.decode()?;
        let outcomes = self.on_login(login.principal_id).await?;
        tracing::debug!(
            principal_id = %login.principal_id,
            campaigns = outcomes.len(),
            "login processed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn backoff_saturates() {
        let policy = RetryPolicy {
            max_attempts: 100,
            base_delay: Duration::from_secs(1),
        };
        assert!(policy.backoff(80) >= Duration::from_secs(1 << 31));
    }
}

use super::log::{SagaLog, SagaRecord, SagaState, SagaStep};
use super::steps::ExternalResources;
use super::SagaError;
use crate::store::PrincipalStore;
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use questline_bus::payloads::{
    CompensationOutcome, DeletionFailed, DeletionRequested, DeletionSucceeded,
};
use questline_bus::{Envelope, MessageBus, MessageHandler, emit, topics};
use std::sync::Arc;
use uuid::Uuid;

/// Failure reason recorded for sagas found unfinished at startup.
pub const INTERRUPTED_REASON: &str = "interrupted";

pub struct DeletionSaga {
    principals: Arc<dyn PrincipalStore>,
    external: Arc<dyn ExternalResources>,
    log: Arc<dyn SagaLog>,
    bus: Arc<dyn MessageBus>,
}

impl DeletionSaga {
    pub fn new(
        principals: Arc<dyn PrincipalStore>,
        external: Arc<dyn ExternalResources>,
        log: Arc<dyn SagaLog>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        Self {
            principals,
            external,
            log,
            bus,
        }
    }

    /// Run the saga for one principal and return its terminal record.
    ///
    /// A step failure is not an error here: it ends in a `Failed` record after
    /// compensation. So does a saga log that stops accepting records once the
    /// saga started. The only error is a log that rejects the very first
    /// record, before anything ran.
    #[tracing::instrument(skip_all, fields(%principal_id, saga_id = tracing::field::Empty))]
    pub async fn execute(&self, principal_id: Uuid) -> Result<SagaRecord, SagaError> {
        let mut record = SagaRecord::start(principal_id);
        tracing::Span::current().record("saga_id", tracing::field::display(record.saga_id));
        self.log.append(&record).await?;
        tracing::info!("deletion saga started");

        for step in SagaStep::ORDER {
            record.begin_step(step);
            if let Err(err) = self.log.append(&record).await {
                tracing::error!(%step, error = %err, "saga log rejected step start");
                record.abandon_step();
                return Ok(self
                    .fail(record, format!("saga log unavailable before {step}: {err}"))
                    .await);
            }
            if let Err(err) = self.run_step(step, principal_id).await {
                tracing::warn!(%step, error = %err, "deletion saga step failed");
                record.abandon_step();
                return Ok(self.fail(record, err.to_string()).await);
            }
            record.complete_step(step);
            if let Err(err) = self.log.append(&record).await {
                tracing::error!(%step, error = %err, "saga log rejected step completion");
                return Ok(self
                    .fail(record, format!("saga log unavailable after {step}: {err}"))
                    .await);
            }
        }

        record.transition(SagaState::Succeeded);
        if let Err(err) = self.log.append(&record).await {
            // An unlogged success would be undone by the next recovery, after
            // the success event went out.
            tracing::error!(error = %err, "saga log rejected terminal state");
            return Ok(self
                .fail(record, format!("saga log unavailable at completion: {err}"))
                .await);
        }
        metrics::counter!("questline_saga_total", "outcome" => "succeeded").increment(1);
        tracing::info!("deletion saga succeeded");
        if let Err(err) = emit(
            self.bus.as_ref(),
            topics::USER_DELETION_SUCCEEDED,
            &principal_id.to_string(),
            &DeletionSucceeded { principal_id },
        )
        .await
        {
            tracing::warn!(error = %err, "failed to publish deletion success");
        }
        Ok(record)
    }

    /// Compensate every saga the log holds in a non-terminal state, then
    /// compact the log.
    pub async fn recover(&self) -> Result<usize, SagaError> {
        let pending = self.log.incomplete().await?;
        let count = pending.len();
        for record in pending {
            tracing::warn!(
                saga_id = %record.saga_id,
                principal_id = %record.correlation_id,
                state = ?record.state,
                completed = record.completed_steps.len(),
                in_flight = ?record.in_flight,
                "recovering interrupted deletion saga"
            );
            self.fail(record, INTERRUPTED_REASON.to_string()).await;
        }
        match self.log.compact().await {
            Ok(dropped) => tracing::debug!(dropped, "saga log compacted"),
            Err(err) => tracing::warn!(error = %err, "saga log compaction failed"),
        }
        Ok(count)
    }

    async fn run_step(&self, step: SagaStep, principal_id: Uuid) -> Result<(), SagaError> {
        let result = match step {
            SagaStep::ExternalResourceCleanup => self.external.cleanup(principal_id).await,
            SagaStep::LocalSoftDelete => self
                .principals
                .soft_delete(principal_id, Utc::now())
                .await
                .map_err(anyhow::Error::from),
        };
        result.map_err(|err| SagaError::Step {
            step,
            reason: format!("{err:#}"),
        })
    }

    async fn compensate(&self, step: SagaStep, principal_id: Uuid) -> anyhow::Result<()> {
        match step {
            SagaStep::ExternalResourceCleanup => self.external.restore(principal_id).await,
            SagaStep::LocalSoftDelete => self
                .principals
                .restore(principal_id)
                .await
                .context("restore principal"),
        }
    }

    /// Undo completed steps newest first, starting with a step that was in
    /// flight. Each compensation runs even when an earlier one failed, and
    /// the failure event goes out even when the log rejects the records.
    async fn fail(&self, mut record: SagaRecord, reason: String) -> SagaRecord {
        let principal_id = record.correlation_id;
        record.reason = Some(reason.clone());
        record.transition(SagaState::Compensating);
        self.append_or_log(&record).await;

        let steps = record.steps_to_compensate();
        let mut outcomes = Vec::with_capacity(steps.len());
        for step in steps {
            let outcome = match self.compensate(step, principal_id).await {
                Ok(()) => CompensationOutcome {
                    step: step.name().to_string(),
                    ok: true,
                    error: None,
                },
                Err(err) => {
                    tracing::error!(
                        %step,
                        compensation = step.compensation_name(),
                        error = %format!("{err:#}"),
                        "compensation failed"
                    );
                    CompensationOutcome {
                        step: step.name().to_string(),
                        ok: false,
                        error: Some(format!("{err:#}")),
                    }
                }
            };
            outcomes.push(outcome);
        }
        record.in_flight = None;
        record.compensation = outcomes.clone();
        record.transition(SagaState::Failed);
        self.append_or_log(&record).await;

        let payload = DeletionFailed {
            principal_id,
            reason,
            compensation: outcomes,
        };
        let outcome = if payload.fully_compensated() {
            "compensated"
        } else {
            "compensation_failed"
        };
        metrics::counter!("questline_saga_total", "outcome" => outcome).increment(1);
        if let Err(err) = emit(
            self.bus.as_ref(),
            topics::USER_DELETION_FAILED,
            &principal_id.to_string(),
            &payload,
        )
        .await
        {
            tracing::warn!(error = %err, "failed to publish deletion failure");
        }
        record
    }

    async fn append_or_log(&self, record: &SagaRecord) {
        if let Err(err) = self.log.append(record).await {
            tracing::error!(
                saga_id = %record.saga_id,
                state = ?record.state,
                error = %err,
                "saga log append failed during compensation"
            );
        }
    }
}

#[async_trait]
impl MessageHandler for DeletionSaga {
    async fn handle(&self, envelope: Envelope) -> anyhow::Result<()> {
        let request: DeletionRequested = envelope
            .decode()
            .context("decode user.deletion.requested payload")?;
        self.execute(request.principal_id)
            .await
            .context("deletion saga")?;
        Ok(())
    }
}

//! Principal deletion saga.
//!
//! # Steps
//! 1. `external-resource-cleanup`: soft-delete the principal's records in
//!    the event service. Compensated by `restore-external-resource`.
//! 2. `local-soft-delete`: mark the principal deleted. Compensated by
//!    `restore`.
//!
//! Every state transition is appended to a [`SagaLog`] before the next step
//! runs, so a restart can find sagas that never reached a terminal state and
//! compensate what they completed.
mod log;
mod orchestrator;
mod steps;

pub use log::{FileSagaLog, InMemorySagaLog, SagaLog, SagaRecord, SagaState, SagaStep};
pub use orchestrator::{DeletionSaga, INTERRUPTED_REASON};
pub use steps::{EventsClient, ExternalResources};

#[derive(Debug, thiserror::Error)]
pub enum SagaError {
    #[error("step {step} failed: {reason}")]
    Step { step: SagaStep, reason: String },
    #[error("saga log io: {0}")]
    LogIo(#[from] std::io::Error),
    #[error("saga log encoding: {0}")]
    LogEncode(#[from] serde_json::Error),
}

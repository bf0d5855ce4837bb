//! Event-service data model.
//!
//! # Purpose
//! Campaigns and their rewards are catalog data. Progress records and reward
//! requests are per-principal state that the deletion saga soft-deletes and
//! restores as a unit.
mod campaign;
mod progress;
mod request;
mod reward;

pub use campaign::{Campaign, Condition, ConditionKind};
pub use progress::{Progress, ProgressKey};
pub use request::{Decision, RequestFilter, RequestStatus, RewardRequest};
pub use reward::{Reward, RewardKind};

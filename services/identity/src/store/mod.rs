use crate::model::{Principal, ProfilePatch};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use questline_trust::Role;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Principal persistence. Reads skip soft-deleted principals unless noted.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Fails with `Conflict` when the handle or email is taken, including by
    /// a soft-deleted principal.
    async fn create_principal(&self, principal: Principal) -> StoreResult<Principal>;
    async fn get_principal(&self, id: Uuid) -> StoreResult<Principal>;
    async fn find_by_handle(&self, handle: &str) -> StoreResult<Principal>;
    async fn handle_exists(&self, handle: &str) -> StoreResult<bool>;
    async fn list_principals(&self) -> StoreResult<Vec<Principal>>;
    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> StoreResult<Principal>;
    async fn set_role(&self, id: Uuid, role: Role) -> StoreResult<Principal>;

    /// Marks the principal deleted. Already-deleted principals are left as
    /// they are so the saga step can be replayed.
    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;
    /// Clears the deletion marker. Restoring a live principal is a no-op.
    async fn restore(&self, id: Uuid) -> StoreResult<()>;
    /// Hard-deletes principals soft-deleted before `cutoff`.
    async fn purge_deleted(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;

    fn backend_name(&self) -> &'static str;
}

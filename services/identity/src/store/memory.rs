//! In-memory principal store.
//!
//! Not durable. Uniqueness checks and inserts happen under one write lock.
use super::{PrincipalStore, StoreError, StoreResult};
use crate::model::{Principal, ProfilePatch};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use questline_trust::Role;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryPrincipalStore {
    principals: Arc<RwLock<HashMap<Uuid, Principal>>>,
}

impl InMemoryPrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Includes soft-deleted principals.
    pub async fn get_any(&self, id: Uuid) -> Option<Principal> {
        self.principals.read().await.get(&id).cloned()
    }
}

fn not_found(id: Uuid) -> StoreError {
    StoreError::NotFound(format!("principal {id}"))
}

#[async_trait]
impl PrincipalStore for InMemoryPrincipalStore {
    async fn create_principal(&self, principal: Principal) -> StoreResult<Principal> {
        let mut principals = self.principals.write().await;
        if principals.values().any(|existing| existing.handle == principal.handle) {
            return Err(StoreError::Conflict(format!(
                "handle {} is taken",
                principal.handle
            )));
        }
        if principals
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&principal.email))
        {
            return Err(StoreError::Conflict("email is already registered".to_string()));
        }
        principals.insert(principal.id, principal.clone());
        metrics::gauge!("questline_identity_principals").set(principals.len() as f64);
        Ok(principal)
    }

    async fn get_principal(&self, id: Uuid) -> StoreResult<Principal> {
        self.principals
            .read()
            .await
            .get(&id)
            .filter(|principal| !principal.is_deleted())
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn find_by_handle(&self, handle: &str) -> StoreResult<Principal> {
        self.principals
            .read()
            .await
            .values()
            .find(|principal| principal.handle == handle && !principal.is_deleted())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("principal {handle}")))
    }

    async fn handle_exists(&self, handle: &str) -> StoreResult<bool> {
        Ok(self
            .principals
            .read()
            .await
            .values()
            .any(|principal| principal.handle == handle))
    }

    async fn list_principals(&self) -> StoreResult<Vec<Principal>> {
        let mut items: Vec<Principal> = self
            .principals
            .read()
            .await
            .values()
            .filter(|principal| !principal.is_deleted())
            .cloned()
            .collect();
        items.sort_by(|a, b| a.handle.cmp(&b.handle));
        Ok(items)
    }

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> StoreResult<Principal> {
        let mut principals = self.principals.write().await;
        if let Some(email) = patch.email.as_deref()
            && principals
                .values()
                .any(|other| other.id != id && other.email.eq_ignore_ascii_case(email))
        {
            return Err(StoreError::Conflict("email is already registered".to_string()));
        }
        let principal = principals
            .get_mut(&id)
            .filter(|principal| !principal.is_deleted())
            .ok_or_else(|| not_found(id))?;
        if let Some(email) = patch.email {
            principal.email = email;
        }
        if let Some(profile) = patch.profile {
            principal.profile.extend(profile);
        }
        Ok(principal.clone())
    }

    async fn set_role(&self, id: Uuid, role: Role) -> StoreResult<Principal> {
        let mut principals = self.principals.write().await;
        let principal = principals
            .get_mut(&id)
            .filter(|principal| !principal.is_deleted())
            .ok_or_else(|| not_found(id))?;
        principal.role = role;
        Ok(principal.clone())
    }

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let mut principals = self.principals.write().await;
        let principal = principals.get_mut(&id).ok_or_else(|| not_found(id))?;
        if principal.deleted_at.is_none() {
            principal.deleted_at = Some(at);
        }
        Ok(())
    }

    async fn restore(&self, id: Uuid) -> StoreResult<()> {
        let mut principals = self.principals.write().await;
        let principal = principals.get_mut(&id).ok_or_else(|| not_found(id))?;
        principal.deleted_at = None;
        Ok(())
    }

    async fn purge_deleted(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let mut principals = self.principals.write().await;
        let before = principals.len();
        principals.retain(|_, principal| principal.deleted_at.is_none_or(|at| at >= cutoff));
        metrics::gauge!("questline_identity_principals").set(principals.len() as f64);
        Ok(before - principals.len())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

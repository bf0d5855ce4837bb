//! Periodic hard-delete of principals soft-deleted past the retention window.
use crate::session::InMemoryTtlStore;
use crate::store::PrincipalStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub fn spawn_purge_task(
    principals: Arc<dyn PrincipalStore>,
    sessions: Option<InMemoryTtlStore>,
    interval: Duration,
    retention_days: i64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let cutoff = Utc::now() - chrono::Duration::days(retention_days);
            match principals.purge_deleted(cutoff).await {
                Ok(purged) => tracing::info!(purged, %cutoff, "purged soft-deleted principals"),
                Err(err) => tracing::warn!(error = %err, "principal purge failed"),
            }
            if let Some(store) = &sessions {
                let swept = store.sweep().await;
                tracing::debug!(swept, "expired session keys swept");
            }
        }
    })
}

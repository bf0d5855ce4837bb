//! Periodic hard-delete of soft-deleted rows past the retention window.
use crate::store::RetentionStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub fn spawn_purge_task(
    store: Arc<dyn RetentionStore>,
    interval: Duration,
    retention_days: i64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it so startup is quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let cutoff = Utc::now() - chrono::Duration::days(retention_days);
            match store.purge_deleted(cutoff).await {
                Ok(purged) => tracing::info!(purged, %cutoff, "purged soft-deleted records"),
                Err(err) => tracing::warn!(error = %err, "purge failed"),
            }
        }
    })
}

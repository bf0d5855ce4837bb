//! Remote side of the deletion saga.
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

/// Per-principal records held by other services.
#[async_trait]
pub trait ExternalResources: Send + Sync {
    async fn cleanup(&self, principal_id: Uuid) -> Result<()>;
    async fn restore(&self, principal_id: Uuid) -> Result<()>;
}

/// Calls the event service's internal principal endpoints.
#[derive(Debug, Clone)]
pub struct EventsClient {
    client: reqwest::Client,
    base_url: String,
}

impl EventsClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build events client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn principal_url(&self, principal_id: Uuid) -> String {
        format!("{}/events/internal/users/{principal_id}", self.base_url)
    }
}

#[async_trait]
impl ExternalResources for EventsClient {
    async fn cleanup(&self, principal_id: Uuid) -> Result<()> {
        self.client
            .delete(self.principal_url(principal_id))
            .send()
            .await
            .context("cleanup request")?
            .error_for_status()
            .context("cleanup status")?;
        Ok(())
    }

    async fn restore(&self, principal_id: Uuid) -> Result<()> {
        self.client
            .post(format!("{}/restore", self.principal_url(principal_id)))
            .send()
            .await
            .context("restore request")?
            .error_for_status()
            .context("restore status")?;
        Ok(())
    }
}

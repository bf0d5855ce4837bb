//! Message bus used between the questline services.
//!
//! # Purpose
//! Services publish [`Envelope`]s through the [`MessageBus`] trait and consume
//! them with a [`MessageHandler`]. Two transports are provided:
//! - [`InMemoryBus`]: per-topic bounded queues inside one process.
//! - [`HttpBus`]: JSON POSTs to subscriber services, received by
//!   [`ingest_router`].
//!
//! # Delivery
//! Delivery is at-least-once. A consumer handles one message at a time and
//! only acknowledges (returns 2xx, or pulls the next item) after its handler
//! finished.
use async_trait::async_trait;

pub mod consumer;
pub mod envelope;
pub mod http;
pub mod memory;
pub mod payloads;
pub mod topics;

pub use consumer::{MessageHandler, spawn_consumer};
pub use envelope::Envelope;
pub use http::{HttpBus, ingest_router, parse_subscribers};
pub use memory::InMemoryBus;

pub type BusResult<T> = std::result::Result<T, BusError>;

#[derive(thiserror::Error, Debug)]
pub enum BusError {
    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("subscriber queue closed for topic {0}")]
    Closed(String),
    #[error("delivery to {url} failed: {reason}")]
    Delivery { url: String, reason: String },
    #[error("no subscriber configured for required topic {0}")]
    Unrouted(String),
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, envelope: Envelope) -> BusResult<()>;
}

/// Serialize `payload` and publish it on `topic`.
pub async fn emit<T>(bus: &dyn MessageBus, topic: &str, key: &str, payload: &T) -> BusResult<()>
where
    T: serde::Serialize + Sync,
{
    let envelope = Envelope::new(topic, key, payload)?;
    bus.publish(envelope).await
}

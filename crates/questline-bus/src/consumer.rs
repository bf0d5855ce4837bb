use crate::Envelope;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, envelope: Envelope) -> anyhow::Result<()>;
}

/// Drain `rx` one message at a time until every sender is gone.
///
/// The next message is only pulled after the handler returned. Handler errors
/// are logged and counted; the loop keeps going.
pub fn spawn_consumer(
    name: &'static str,
    mut rx: mpsc::Receiver<Envelope>,
    handler: Arc<dyn MessageHandler>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let message_id = envelope.id;
            let topic = envelope.topic.clone();
            if let Err(err) = handler.handle(envelope).await {
                metrics::counter!("questline_bus_handler_errors_total", "consumer" => name)
                    .increment(1);
                tracing::warn!(
                    consumer = name,
                    %topic,
                    %message_id,
                    error = %err,
                    "message handler failed"
                );
            }
        }
        tracing::debug!(consumer = name, "consumer stopped");
    })
}

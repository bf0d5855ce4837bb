//! HTTP transport for the bus.
//!
//! Publishers POST the JSON envelope to `{subscriber}/internal/bus/{topic}`.
//! The subscriber answers 204 only after its handler finished, so a 2xx is
//! the acknowledgement. Messages on a topic are handled one at a time.
//!
//! The handler runs on its own task. A publisher that gives up (timeout,
//! dropped connection) loses its acknowledgement but never cancels a handler
//! that already started.
use crate::{BusError, BusResult, Envelope, MessageBus, MessageHandler};
use async_trait::async_trait;
use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Parse `topic=url[,topic=url...]` into per-topic subscriber lists.
pub fn parse_subscribers(spec: &str) -> anyhow::Result<HashMap<String, Vec<String>>> {
    let mut routes: HashMap<String, Vec<String>> = HashMap::new();
    for entry in spec.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (topic, url) = entry
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("subscriber entry missing '=': {entry}"))?;
        let (topic, url) = (topic.trim(), url.trim());
        if topic.is_empty() || url.is_empty() {
            anyhow::bail!("subscriber entry has empty topic or url: {entry}");
        }
        routes
            .entry(topic.to_string())
            .or_default()
            .push(url.trim_end_matches('/').to_string());
    }
    Ok(routes)
}

/// Publishes over HTTP. A topic without subscribers is dropped at debug
/// level unless it was marked with [`HttpBus::require_routes`], in which case
/// publishing fails with [`BusError::Unrouted`].
#[derive(Clone)]
pub struct HttpBus {
    client: reqwest::Client,
    routes: Arc<HashMap<String, Vec<String>>>,
    required: Arc<HashSet<String>>,
}

impl HttpBus {
    pub fn new(routes: HashMap<String, Vec<String>>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            routes: Arc::new(routes),
            required: Arc::new(HashSet::new()),
        })
    }

    pub fn require_routes(mut self, topics: &[&str]) -> Self {
        let mut required = (*self.required).clone();
        required.extend(topics.iter().map(|topic| topic.to_string()));
        self.required = Arc::new(required);
        self
    }

    /// Required topics that have no subscriber configured.
    pub fn unrouted_required(&self) -> Vec<&str> {
        let mut missing: Vec<&str> = self
            .required
            .iter()
            .filter(|topic| !self.routes.contains_key(topic.as_str()))
            .map(String::as_str)
            .collect();
        missing.sort_unstable();
        missing
    }

    async fn deliver(&self, base_url: &str, envelope: &Envelope) -> BusResult<()> {
        let url = format!("{base_url}/internal/bus/{}", envelope.topic);
        let response = self
            .client
            .post(&url)
            .json(envelope)
            .send()
            .await
            .map_err(|err| BusError::Delivery {
                url: url.clone(),
                reason: err.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(BusError::Delivery {
                url,
                reason: format!("subscriber answered {}", response.status()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MessageBus for HttpBus {
    async fn publish(&self, envelope: Envelope) -> BusResult<()> {
        metrics::counter!("questline_bus_published_total", "topic" => envelope.topic.clone())
            .increment(1);
        let Some(targets) = self.routes.get(&envelope.topic) else {
            if self.required.contains(&envelope.topic) {
                return Err(BusError::Unrouted(envelope.topic));
            }
            tracing::debug!(topic = %envelope.topic, "no subscribers configured");
            return Ok(());
        };
        let mut first_error = None;
        for base_url in targets {
            if let Err(err) = self.deliver(base_url, &envelope).await {
                tracing::warn!(topic = %envelope.topic, error = %err, "bus delivery failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct TopicHandler {
    handler: Arc<dyn MessageHandler>,
    // Serializes deliveries so a topic sees one message at a time.
    gate: Arc<tokio::sync::Mutex<()>>,
}

#[derive(Clone)]
struct IngestState {
    topics: Arc<HashMap<String, TopicHandler>>,
}

/// Router receiving envelopes for the given topic handlers.
pub fn ingest_router(handlers: HashMap<String, Arc<dyn MessageHandler>>) -> Router {
    let topics = handlers
        .into_iter()
        .map(|(topic, handler)| {
            (
                topic,
                TopicHandler {
                    handler,
                    gate: Arc::new(tokio::sync::Mutex::new(())),
                },
            )
        })
        .collect();
    Router::new()
        .route("/internal/bus/:topic", axum::routing::post(ingest))
        .with_state(IngestState {
            topics: Arc::new(topics),
        })
}

async fn ingest(
    State(state): State<IngestState>,
    Path(topic): Path<String>,
    Json(envelope): Json<Envelope>,
) -> StatusCode {
    if envelope.topic != topic {
        return StatusCode::BAD_REQUEST;
    }
    let Some(entry) = state.topics.get(&topic) else {
        return StatusCode::NOT_FOUND;
    };
    let message_id = envelope.id;
    let handler = entry.handler.clone();
    let gate = entry.gate.clone();
    let task = tokio::spawn(async move {
        let _guard = gate.lock_owned().await;
        handler.handle(envelope).await
    });
    match task.await {
        Ok(Ok(())) => StatusCode::NO_CONTENT,
        Ok(Err(err)) => {
            metrics::counter!("questline_bus_handler_errors_total", "consumer" => "http_ingest")
                .increment(1);
            tracing::warn!(%topic, %message_id, error = %err, "ingested message failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        Err(err) => {
            tracing::error!(%topic, %message_id, error = %err, "ingest task aborted");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

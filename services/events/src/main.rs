//! Event service entry point.
//!
//! Wires configuration, the store, the bus, and the progress pipeline, then
//! serves the HTTP API until ctrl-c.
use anyhow::Context;
use events::app::{AppState, build_router};
use events::config::EventsConfig;
use events::progress::{ProgressPipeline, RetryPolicy};
use events::purge::spawn_purge_task;
use events::store::memory::InMemoryStore;
use questline_bus::{HttpBus, topics};
use questline_common::observability;
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EventsConfig::from_env_or_yaml().context("events config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: EventsConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("questline-events");
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let store = Arc::new(InMemoryStore::new());
    let bus = HttpBus::new(config.bus_subscribers.clone(), config.bus_timeout)?
        .require_routes(&[topics::PROGRESS_FAILED, topics::PROGRESS_DLQ]);
    for topic in bus.unrouted_required() {
        tracing::error!(
            topic,
            "no subscriber configured; failures on this topic are only logged"
        );
    }
    let bus = Arc::new(bus);
    let pipeline = Arc::new(ProgressPipeline::new(
        store.clone(),
        bus,
        RetryPolicy {
            max_attempts: config.max_attempts,
            base_delay: config.backoff_base,
        },
    ));
    let purge_task = spawn_purge_task(store.clone(), config.purge_interval, config.retention_days);
    let app = build_router(AppState { store, pipeline });

    let addr = config.bind_addr;
    tracing::info!(%addr, "event service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    purge_task.abort();
    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

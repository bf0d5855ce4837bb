//! Identity service entry point.
//!
//! Wires configuration, stores, the session service, and the deletion saga,
//! recovers sagas left unfinished by a previous run, then serves the HTTP API
//! until ctrl-c.
use anyhow::Context;
use identity::app::{AppState, build_router};
use identity::config::IdentityConfig;
use identity::purge::spawn_purge_task;
use identity::saga::{DeletionSaga, EventsClient, FileSagaLog, InMemorySagaLog, SagaLog};
use identity::session::{InMemoryTtlStore, SessionService, SessionSettings};
use identity::store::memory::InMemoryPrincipalStore;
use questline_bus::{HttpBus, topics};
use questline_common::observability;
use questline_trust::SessionKeys;
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = IdentityConfig::from_env_or_yaml().context("identity config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: IdentityConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("questline-identity");
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let principals = Arc::new(InMemoryPrincipalStore::new());
    let ttl_store = InMemoryTtlStore::new();
    let sessions = SessionService::new(
        SessionKeys::from_secret(&config.jwt_secret),
        Arc::new(ttl_store.clone()),
        SessionSettings {
            access_ttl: config.access_ttl,
            renewal_ttl: config.renewal_ttl,
            rotate_renewal_on_use: config.rotate_renewal,
        },
    );
    let bus = HttpBus::new(config.bus_subscribers.clone(), config.bus_timeout)?
        .require_routes(&[topics::USER_DELETION_REQUESTED]);
    for topic in bus.unrouted_required() {
        tracing::error!(topic, "no subscriber configured; account deletion will fail");
    }
    let bus = Arc::new(bus);
    let saga_log: Arc<dyn SagaLog> = match &config.saga_log {
        Some(path) => {
            tracing::info!(path = %path.display(), "using file saga log");
            Arc::new(FileSagaLog::new(path))
        }
        None => {
            tracing::warn!("QUESTLINE_SAGA_LOG not set; saga state will not survive restarts");
            Arc::new(InMemorySagaLog::new())
        }
    };
    let saga = Arc::new(DeletionSaga::new(
        principals.clone(),
        Arc::new(EventsClient::new(&config.events_url, config.events_timeout)?),
        saga_log,
        bus.clone(),
    ));

    let recovered = saga.recover().await.context("recover deletion sagas")?;
    if recovered > 0 {
        tracing::warn!(recovered, "compensated interrupted deletion sagas");
    }

    let purge_task = spawn_purge_task(
        principals.clone(),
        Some(ttl_store),
        config.purge_interval,
        config.retention_days,
    );
    let app = build_router(AppState {
        principals,
        sessions,
        bus,
        saga,
    });

    let addr = config.bind_addr;
    tracing::info!(%addr, "identity service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    purge_task.abort();
    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

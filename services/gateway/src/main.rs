//! Gateway entry point.
use anyhow::Context;
use gateway::app::{GatewayState, build_router};
use gateway::auth::{Authenticator, IdentityRevocationClient};
use gateway::config::GatewayConfig;
use gateway::policy::RouteTable;
use gateway::proxy::Upstreams;
use questline_common::observability;
use questline_trust::SessionKeys;
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env_or_yaml().context("gateway config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: GatewayConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("questline-gateway");
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let routes = RouteTable::new(config.routes.clone()).context("route table")?;
    let revocation = IdentityRevocationClient::new(&config.auth_url, config.proxy_timeout)?;
    let state = GatewayState {
        routes: Arc::new(routes),
        auth: Authenticator::new(
            SessionKeys::from_secret(&config.jwt_secret),
            Arc::new(revocation),
        ),
        upstreams: Upstreams::new(config.services(), config.proxy_timeout)?,
    };
    let app = build_router(state);

    let addr = config.bind_addr;
    tracing::info!(%addr, "gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

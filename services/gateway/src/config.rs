use crate::policy::{RouteRule, default_rules};
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

// Gateway configuration sourced from environment variables.
#[derive(Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub auth_url: String,
    pub events_url: String,
    pub jwt_secret: Vec<u8>,
    pub proxy_timeout: Duration,
    pub routes: Vec<RouteRule>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("bind_addr", &self.bind_addr)
            .field("metrics_bind", &self.metrics_bind)
            .field("auth_url", &self.auth_url)
            .field("events_url", &self.events_url)
            .field("proxy_timeout", &self.proxy_timeout)
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct GatewayConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    auth_url: Option<String>,
    events_url: Option<String>,
    proxy_timeout_ms: Option<u64>,
    routes: Option<Vec<RouteRule>>,
}

fn env_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("parse {key}"))
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let encoded = std::env::var("QUESTLINE_JWT_SECRET_BASE64")
            .with_context(|| "QUESTLINE_JWT_SECRET_BASE64 is required")?;
        let jwt_secret = STANDARD
            .decode(encoded.trim())
            .with_context(|| "decode QUESTLINE_JWT_SECRET_BASE64")?;
        anyhow::ensure!(!jwt_secret.is_empty(), "QUESTLINE_JWT_SECRET_BASE64 is empty");
        Ok(Self {
            bind_addr: env_parse("QUESTLINE_GATEWAY_BIND", "0.0.0.0:3000")?,
            metrics_bind: env_parse("QUESTLINE_GATEWAY_METRICS_BIND", "0.0.0.0:9100")?,
            auth_url: std::env::var("QUESTLINE_AUTH_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:4001".to_string()),
            events_url: std::env::var("QUESTLINE_EVENTS_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:4002".to_string()),
            jwt_secret,
            proxy_timeout: Duration::from_millis(env_parse("QUESTLINE_PROXY_TIMEOUT_MS", "5000")?),
            routes: default_rules(),
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("QUESTLINE_GATEWAY_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read QUESTLINE_GATEWAY_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        Ok(config)
    }

    /// Service key to base URL, keyed by the first path segment.
    pub fn services(&self) -> HashMap<String, String> {
        HashMap::from([
            ("auth".to_string(), self.auth_url.clone()),
            ("events".to_string(), self.events_url.clone()),
        ])
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: GatewayConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse gateway config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.auth_url {
            self.auth_url = value;
        }
        if let Some(value) = override_cfg.events_url {
            self.events_url = value;
        }
        if let Some(value) = override_cfg.proxy_timeout_ms {
            self.proxy_timeout = Duration::from_millis(value);
        }
        if let Some(value) = override_cfg.routes {
            self.routes = value;
        }
        Ok(())
    }
}

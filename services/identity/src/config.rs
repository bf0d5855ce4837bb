use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PURGE_INTERVAL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_RETENTION_DAYS: i64 = 30;
/// Deletion requests loop back to this service unless configured otherwise.
pub const DEFAULT_SUBSCRIBERS: &str = "user.deletion.requested=http://127.0.0.1:4001,user.login=http://127.0.0.1:4002";

// Identity service configuration sourced from environment variables.
#[derive(Clone)]
pub struct IdentityConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub jwt_secret: Vec<u8>,
    pub access_ttl: Duration,
    pub renewal_ttl: Duration,
    pub rotate_renewal: bool,
    pub events_url: String,
    pub events_timeout: Duration,
    pub saga_log: Option<PathBuf>,
    pub bus_subscribers: HashMap<String, Vec<String>>,
    pub bus_timeout: Duration,
    pub purge_interval: Duration,
    pub retention_days: i64,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("bind_addr", &self.bind_addr)
            .field("metrics_bind", &self.metrics_bind)
            .field("access_ttl", &self.access_ttl)
            .field("renewal_ttl", &self.renewal_ttl)
            .field("rotate_renewal", &self.rotate_renewal)
            .field("events_url", &self.events_url)
            .field("saga_log", &self.saga_log)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct IdentityConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    access_ttl_secs: Option<u64>,
    renewal_ttl_secs: Option<u64>,
    rotate_renewal: Option<bool>,
    events_url: Option<String>,
    events_timeout_ms: Option<u64>,
    saga_log: Option<PathBuf>,
    bus_subscribers: Option<HashMap<String, Vec<String>>>,
    purge_interval_secs: Option<u64>,
    retention_days: Option<i64>,
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

pub(crate) fn decode_secret(encoded: &str) -> Result<Vec<u8>> {
    let secret = STANDARD
        .decode(encoded.trim())
        .with_context(|| "decode QUESTLINE_JWT_SECRET_BASE64")?;
    anyhow::ensure!(!secret.is_empty(), "QUESTLINE_JWT_SECRET_BASE64 is empty");
    Ok(secret)
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self> {
        let encoded = std::env::var("QUESTLINE_JWT_SECRET_BASE64")
            .with_context(|| "QUESTLINE_JWT_SECRET_BASE64 is required")?;
        let subscribers = std::env::var("QUESTLINE_BUS_SUBSCRIBERS")
            .unwrap_or_else(|_| DEFAULT_SUBSCRIBERS.to_string());
        Ok(Self {
            bind_addr: env_parse("QUESTLINE_IDENTITY_BIND", "0.0.0.0:4001")?,
            metrics_bind: env_parse("QUESTLINE_IDENTITY_METRICS_BIND", "0.0.0.0:9101")?,
            jwt_secret: decode_secret(&encoded)?,
            access_ttl: Duration::from_secs(env_parse("QUESTLINE_ACCESS_TTL_SECS", "3600")?),
            renewal_ttl: Duration::from_secs(env_parse("QUESTLINE_RENEWAL_TTL_SECS", "604800")?),
            rotate_renewal: env_parse("QUESTLINE_ROTATE_RENEWAL", "false")?,
            events_url: std::env::var("QUESTLINE_EVENTS_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:4002".to_string()),
            events_timeout: Duration::from_millis(env_parse(
                "QUESTLINE_EVENTS_TIMEOUT_MS",
                "2000",
            )?),
            saga_log: std::env::var("QUESTLINE_SAGA_LOG").ok().map(PathBuf::from),
            bus_subscribers: questline_bus::parse_subscribers(&subscribers)
                .with_context(|| "parse QUESTLINE_BUS_SUBSCRIBERS")?,
            // Deletion requests loop back through this bus and are acknowledged only
            // once the saga finished, so this must exceed a full saga run.
            bus_timeout: Duration::from_millis(env_parse("QUESTLINE_BUS_TIMEOUT_MS", "15000")?),
            purge_interval: Duration::from_secs(env_parse(
                "QUESTLINE_PURGE_INTERVAL_SECS",
                &DEFAULT_PURGE_INTERVAL_SECS.to_string(),
            )?),
            retention_days: env_parse(
                "QUESTLINE_RETENTION_DAYS",
                &DEFAULT_RETENTION_DAYS.to_string(),
            )?,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("QUESTLINE_IDENTITY_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read QUESTLINE_IDENTITY_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: IdentityConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse identity config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.access_ttl_secs {
            self.access_ttl = Duration::from_secs(value);
        }
        if let Some(value) = override_cfg.renewal_ttl_secs {
            self.renewal_ttl = Duration::from_secs(value);
        }
        if let Some(value) = override_cfg.rotate_renewal {
            self.rotate_renewal = value;
        }
        if let Some(value) = override_cfg.events_url {
            self.events_url = value;
        }
        if let Some(value) = override_cfg.events_timeout_ms {
            self.events_timeout = Duration::from_millis(value);
        }
        if let Some(value) = override_cfg.saga_log {
            self.saga_log = Some(value);
        }
        if let Some(value) = override_cfg.bus_subscribers {
            self.bus_subscribers = value;
        }
        if let Some(value) = override_cfg.purge_interval_secs {
            self.purge_interval = Duration::from_secs(value);
        }
        if let Some(value) = override_cfg.retention_days {
            self.retention_days = value;
        }
        Ok(())
    }
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_PURGE_INTERVAL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

// Event service configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct EventsConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub bus_subscribers: HashMap<String, Vec<String>>,
    pub bus_timeout: Duration,
    pub purge_interval: Duration,
    pub retention_days: i64,
}

#[derive(Debug, Deserialize)]
struct EventsConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    max_attempts: Option<u32>,
    backoff_ms: Option<u64>,
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

impl EventsConfig {
    pub fn from_env() -> Result<Self> {
        let bus_subscribers = questline_bus::parse_subscribers(
            &std::env::var("QUESTLINE_BUS_SUBSCRIBERS").unwrap_or_default(),
        )
        .with_context(|| "parse QUESTLINE_BUS_SUBSCRIBERS")?;
        Ok(Self {
            bind_addr: env_parse("QUESTLINE_EVENTS_BIND", "0.0.0.0:4002")?,
            metrics_bind: env_parse("QUESTLINE_EVENTS_METRICS_BIND", "0.0.0.0:9102")?,
            max_attempts: env_parse("QUESTLINE_PROGRESS_MAX_ATTEMPTS", "3")?,
            backoff_base: Duration::from_millis(env_parse("QUESTLINE_PROGRESS_BACKOFF_MS", "100")?),
            bus_subscribers,
            bus_timeout: Duration::from_millis(env_parse("QUESTLINE_BUS_TIMEOUT_MS", "5000")?),
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
        if let Ok(path) = std::env::var("QUESTLINE_EVENTS_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read QUESTLINE_EVENTS_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: EventsConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse events config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.max_attempts {
            self.max_attempts = value;
        }
        if let Some(value) = override_cfg.backoff_ms {
            self.backoff_base = Duration::from_millis(value);
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

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_match_pipeline_contract() {
        let config = EventsConfig::from_env().expect("config");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff_base, Duration::from_millis(100));
        assert_eq!(config.retention_days, 30);
    }

    #[test]
    #[serial]
    fn yaml_overrides_selected_fields() {
        let mut config = EventsConfig::from_env().expect("config");
        config
            .apply_yaml(
                "bind_addr: 127.0.0.1:5002\nbackoff_ms: 5\nbus_subscribers:\n  event.progress.dlq:\n    - http://audit:9000\n",
            )
            .expect("yaml");
        assert_eq!(config.bind_addr, "127.0.0.1:5002".parse().expect("addr"));
        assert_eq!(config.backoff_base, Duration::from_millis(5));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(
            config.bus_subscribers.get("event.progress.dlq"),
            Some(&vec!["http://audit:9000".to_string()])
        );
        assert!(config.apply_yaml("bind_addr: nope").is_err());
    }
}

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, TimegateError};

/// Service configuration, loaded from `config.toml` with `TIMEGATE_*`
/// environment overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Initial simulated handler delay for the basics endpoints, in ms.
    pub initial_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            initial_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub job: String,
    pub instance: String,
    /// Base URL of the push gateway; pushing is disabled when unset.
    pub pushgateway_url: Option<String>,
    pub push_interval_seconds: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            job: "timegate".to_string(),
            instance: "default".to_string(),
            pushgateway_url: None,
            push_interval_seconds: 15,
        }
    }
}

impl Config {
    /// Load `config.toml` if present, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        let mut config = if Path::new(config_path).exists() {
            let content = fs::read_to_string(config_path).map_err(|e| {
                TimegateError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path, e
                ))
            })?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        if let Ok(port) = std::env::var("TIMEGATE_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| TimegateError::Config(format!("invalid TIMEGATE_PORT: {port}")))?;
        }
        if let Ok(url) = std::env::var("TIMEGATE_PUSHGATEWAY_URL") {
            if !url.trim().is_empty() {
                config.metrics.pushgateway_url = Some(url);
            }
        }
        if let Ok(instance) = std::env::var("TIMEGATE_INSTANCE") {
            config.metrics.instance = instance;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.metrics.job, "timegate");
        assert!(config.metrics.pushgateway_url.is_none());
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9090

            [metrics]
            pushgateway_url = "http://localhost:9091"
            "#,
        )
        .expect("valid config");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.initial_delay_ms, 500);
        assert_eq!(
            config.metrics.pushgateway_url.as_deref(),
            Some("http://localhost:9091")
        );
        assert_eq!(config.metrics.push_interval_seconds, 15);
    }
}

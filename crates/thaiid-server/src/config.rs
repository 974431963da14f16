//! Service configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `CARD_SERVICE__*` environment variables.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thaiid_card::{MonitorConfig, RetryPolicy};

/// Prefix for environment overrides, e.g. `CARD_SERVICE__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "CARD_SERVICE";

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub server: ServerSettings,
    pub log: LogSettings,
    pub monitor: MonitorSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    /// `host:port` for the listener
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSettings {
    pub poll_interval_ms: u64,
    pub reader_backoff_ms: u64,
    pub select_attempts: u32,
    pub retry_delay_ms: u64,
    pub settle_delay_ms: u64,
}

impl From<&MonitorSettings> for MonitorConfig {
    fn from(settings: &MonitorSettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            reader_backoff: Duration::from_millis(settings.reader_backoff_ms),
            retry: RetryPolicy {
                attempts: settings.select_attempts.max(1),
                retry_delay: Duration::from_millis(settings.retry_delay_ms),
                settle_delay: Duration::from_millis(settings.settle_delay_ms),
            },
        }
    }
}

impl ServiceConfig {
    /// Load from `path` (which may be missing) and the process environment
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, environment())
    }

    pub fn load_with(path: &Path, env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080_i64)?
            .set_default("log.level", "info")?
            .set_default("monitor.poll_interval_ms", 500_i64)?
            .set_default("monitor.reader_backoff_ms", 2000_i64)?
            .set_default("monitor.select_attempts", 3_i64)?
            .set_default("monitor.retry_delay_ms", 200_i64)?
            .set_default("monitor.settle_delay_ms", 50_i64)?
            .add_source(File::from(path).required(false))
            .add_source(env)
            .build()?
            .try_deserialize()
    }
}

/// Environment source with the service prefix and `__` nesting
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn no_env() -> Environment {
        environment().source(Some(HashMap::new()))
    }

    fn temp_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "thaiid-server-{}-{}.toml",
            name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let cfg = ServiceConfig::load_with(Path::new("/nonexistent/config.toml"), no_env()).unwrap();

        assert_eq!(cfg.server.address(), "0.0.0.0:8080");
        assert_eq!(cfg.log.level, "info");

        let monitor = MonitorConfig::from(&cfg.monitor);
        assert_eq!(monitor, MonitorConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = temp_config(
            "file",
            "[server]\nport = 9100\n\n[monitor]\npoll_interval_ms = 250\nselect_attempts = 5\n",
        );

        let cfg = ServiceConfig::load_with(&path, no_env()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.monitor.poll_interval_ms, 250);
        assert_eq!(cfg.monitor.select_attempts, 5);
        assert_eq!(cfg.monitor.retry_delay_ms, 200);
    }

    #[test]
    fn test_environment_overrides_file() {
        let path = temp_config("env", "[server]\nport = 9100\n");
        let env = environment().source(Some(HashMap::from([
            ("CARD_SERVICE__SERVER__PORT".to_string(), "9000".to_string()),
            ("CARD_SERVICE__LOG__LEVEL".to_string(), "debug".to_string()),
        ])));

        let cfg = ServiceConfig::load_with(&path, env).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.log.level, "debug");
    }

    #[test]
    fn test_zero_attempts_still_selects_once() {
        let mut cfg = ServiceConfig::load_with(Path::new("/nonexistent/config.toml"), no_env()).unwrap();
        cfg.monitor.select_attempts = 0;

        let monitor = MonitorConfig::from(&cfg.monitor);
        assert_eq!(monitor.retry.attempts, 1);
    }
}

//! Application configuration.
//!
//! Loaded from a TOML file with environment overrides (`HUDDL_` prefix,
//! `__` as the nesting separator), both layered over the defaults below.
//! Every section is `#[serde(default)]` so a partial config file is always
//! valid.

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Environment variable prefix for config overrides, e.g.
/// `HUDDL_SERVER__PORT=9100`.
const ENV_PREFIX: &str = "HUDDL";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// HTTP/WebSocket server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Allowed CORS origins. `["*"]` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8520,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// Chat room lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Synthetic first message seeded into every new room.
    pub welcome_message: String,
    /// Seconds to keep a room whose visitor disconnected without ever
    /// sending a message.
    pub abandon_grace_secs: u64,
    /// Seconds to keep a closed room before physical removal.
    pub close_grace_secs: u64,
    /// Sweeper wakeup interval.
    pub sweep_interval_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            welcome_message: "Hello! How can we help you today?".to_string(),
            abandon_grace_secs: 120,
            close_grace_secs: 45,
            sweep_interval_secs: 5,
        }
    }
}

/// Load configuration from `config_file` (optional on disk) layered with
/// `HUDDL__`-prefixed environment variables.
pub fn load(config_file: &Path) -> Result<AppConfig> {
    let built = Config::builder()
        .add_source(
            File::from(config_file)
                .format(FileFormat::Toml)
                .required(false),
        )
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .context("building configuration")?;

    // config's deserializer skips serde defaults for missing sections, so
    // deserialize into the defaulted struct directly.
    let config: AppConfig = built
        .try_deserialize()
        .context("deserializing configuration")?;
    Ok(config)
}

/// Write the default configuration to `path`, creating parent directories.
pub fn write_default(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let config = AppConfig::default();
    let toml = toml::to_string_pretty(&config).context("serializing default config to TOML")?;
    let body = format!("# Configuration for huddl\n# File: {}\n\n{toml}", path.display());
    std::fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let config = AppConfig::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        let back: AppConfig = toml::from_str(&toml).unwrap();
        assert_eq!(back.server.port, config.server.port);
        assert_eq!(back.chat.abandon_grace_secs, config.chat.abandon_grace_secs);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9100\n").unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.chat.close_grace_secs, ChatConfig::default().close_grace_secs);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.server.port, ServerConfig::default().port);
    }

    #[test]
    fn test_write_default_is_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        write_default(&path).unwrap();
        let config = load(&path).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
    }
}

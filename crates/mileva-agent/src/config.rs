//! Worker configuration loading from file and environment variables.

use mileva_voice::LiveKitConfig;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level worker configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP surface settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// LiveKit server the agent joins rooms on.
    #[serde(default)]
    pub livekit: LiveKitConfig,

    /// How the agent presents itself in a room.
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Network configuration for the health and dispatch endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "mileva_voice=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Participant identity used in the agent's join token.
    #[serde(default = "default_identity")]
    pub identity: String,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8081
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_identity() -> String {
    "tina".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            identity: default_identity(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `MILEVA_HOST` overrides `server.host`
/// - `MILEVA_PORT` overrides `server.port`
/// - `MILEVA_LOG_LEVEL` overrides `logging.level`
/// - `MILEVA_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `MILEVA_AGENT_IDENTITY` overrides `agent.identity`
/// - `LIVEKIT_URL`, `LIVEKIT_API_KEY`, `LIVEKIT_API_SECRET` override `livekit.*`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// [`load_config`] with an explicit environment lookup.
pub fn load_config_with(
    path: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, lookup);
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(host) = lookup("MILEVA_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = lookup("MILEVA_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(level) = lookup("MILEVA_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("MILEVA_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(identity) = lookup("MILEVA_AGENT_IDENTITY") {
        config.agent.identity = identity;
    }
    if let Some(url) = lookup("LIVEKIT_URL") {
        config.livekit.url = url;
    }
    if let Some(key) = lookup("LIVEKIT_API_KEY") {
        config.livekit.api_key = key;
    }
    if let Some(secret) = lookup("LIVEKIT_API_SECRET") {
        config.livekit.api_secret = secret;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config_with(path.to_str(), no_env).unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.agent.identity, "tina");
        assert_eq!(config.livekit.url, "ws://localhost:7880");
    }

    #[test]
    fn file_values_are_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
host = "0.0.0.0"
port = 9000

[logging]
level = "debug"
json = true

[livekit]
url = "wss://livekit.example.com"
api_key = "key"
api_secret = "shh"

[agent]
identity = "tina-outbound"
"#
        )
        .unwrap();

        let config = load_config_with(file.path().to_str(), no_env).unwrap();
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.livekit.url, "wss://livekit.example.com");
        assert_eq!(config.livekit.api_secret, "shh");
        assert_eq!(config.livekit.token_ttl_seconds, 3600);
        assert_eq!(config.agent.identity, "tina-outbound");
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        let result = load_config_with(file.path().to_str(), no_env);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn no_path_and_no_env_is_default() {
        let config = load_config_with(None, no_env).unwrap();
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("MILEVA_HOST", "0.0.0.0"),
            ("MILEVA_PORT", "7001"),
            ("MILEVA_LOG_JSON", "1"),
            ("MILEVA_AGENT_IDENTITY", "agent-7"),
            ("LIVEKIT_API_SECRET", "prod-secret"),
        ]);
        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.server.port, 7001);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.agent.identity, "agent-7");
        assert_eq!(config.livekit.api_secret, "prod-secret");
        assert_eq!(config.livekit.api_key, "devkey");
    }

    #[test]
    fn unparsable_port_override_is_ignored() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| {
            (key == "MILEVA_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(config.server.port, 8081);
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// LiveKit server used by local `livekit-server --dev`.
pub const DEV_LIVEKIT_URL: &str = "ws://localhost:7880";
/// API key accepted by `livekit-server --dev`.
pub const DEV_LIVEKIT_API_KEY: &str = "devkey";
/// API secret accepted by `livekit-server --dev`.
pub const DEV_LIVEKIT_API_SECRET: &str = "secret";

fn default_token_ttl_seconds() -> u64 {
    3600
}

fn default_url() -> String {
    DEV_LIVEKIT_URL.to_string()
}

fn default_api_key() -> String {
    DEV_LIVEKIT_API_KEY.to_string()
}

fn default_api_secret() -> String {
    DEV_LIVEKIT_API_SECRET.to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LiveKitConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_api_secret", skip_serializing)]
    pub api_secret: String,
    /// JWT token TTL in seconds for agent join tokens. Default: 3600 (1 hour).
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
}

impl Default for LiveKitConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_key: default_api_key(),
            api_secret: default_api_secret(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

impl fmt::Debug for LiveKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveKitConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

impl LiveKitConfig {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

/// Where a provider client sends its requests.
///
/// Every provider speaks the OpenAI-compatible HTTP API, so an endpoint is a
/// base address (ending in `/v1`), a model identifier, a bearer credential
/// and, for speech synthesis, a voice identifier.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub voice: Option<String>,
}

impl ProviderEndpoint {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            voice: None,
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Joins `path` onto the base address without doubling the slash.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl fmt::Debug for ProviderEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEndpoint")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .field("voice", &self.voice)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_joins_cleanly() {
        let endpoint = ProviderEndpoint::new("http://whisper:80/v1/", "m", "k");
        assert_eq!(
            endpoint.url("/audio/transcriptions"),
            "http://whisper:80/v1/audio/transcriptions"
        );
    }

    #[test]
    fn debug_redacts_credentials() {
        let endpoint = ProviderEndpoint::new("http://x/v1", "m", "super-secret");
        let rendered = format!("{:?}", endpoint);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));

        let livekit = LiveKitConfig::new("ws://x", "key", "hidden");
        assert!(!format!("{:?}", livekit).contains("hidden"));
    }

    #[test]
    fn livekit_config_fills_missing_fields() {
        let config: LiveKitConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.url, DEV_LIVEKIT_URL);
        assert_eq!(config.api_key, DEV_LIVEKIT_API_KEY);
        assert_eq!(config.api_secret, DEV_LIVEKIT_API_SECRET);
        assert_eq!(config.token_ttl_seconds, 3600);
    }
}

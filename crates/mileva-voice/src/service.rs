use crate::config::LiveKitConfig;
use crate::error::VoiceError;
use livekit_api::access_token::{AccessToken, VideoGrants};
use std::time::Duration;

/// Issues LiveKit credentials for the agent participant.
#[derive(Debug, Clone)]
pub struct LiveKitService {
    config: LiveKitConfig,
}

impl LiveKitService {
    pub fn new(config: LiveKitConfig) -> Self {
        Self { config }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Generates the join token the agent uses to enter `room_name`.
    ///
    /// The agent may publish (its synthesized speech), subscribe (to hear
    /// the participant) and publish data.
    pub fn agent_token(&self, room_name: &str, identity: &str) -> Result<String, VoiceError> {
        if room_name.trim().is_empty() {
            return Err(VoiceError::Config("room name must not be empty".to_string()));
        }

        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(identity)
            .with_name(identity)
            .with_grants(VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            })
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds));

        token.to_jwt().map_err(VoiceError::LiveKit)
    }
}

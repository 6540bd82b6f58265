use crate::config::ProviderEndpoint;
use crate::error::VoiceError;
use async_trait::async_trait;
use mileva_types::AudioFrame;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Maximum text input size for TTS (64 KiB). Prevents resource exhaustion from
/// oversized synthesis requests.
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Timeout for a synthesis request.
const TTS_TIMEOUT: Duration = Duration::from_secs(60);

/// Sample rate of `response_format: "pcm"` output in the OpenAI speech API.
pub const TTS_SAMPLE_RATE: u32 = 24_000;

/// Text-to-speech provider.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesizes `text` into mono s16 PCM.
    async fn synthesize(&self, text: &str) -> Result<AudioFrame, VoiceError>;
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'static str,
}

/// Client for an OpenAI-compatible `/audio/speech` endpoint (e.g. Kokoro-FastAPI).
#[derive(Debug, Clone)]
pub struct OpenAiTts {
    endpoint: ProviderEndpoint,
    client: Client,
}

impl OpenAiTts {
    /// Creates the client. The endpoint must name a voice.
    pub fn new(endpoint: ProviderEndpoint) -> Result<Self, VoiceError> {
        if endpoint.voice.as_deref().map_or(true, str::is_empty) {
            return Err(VoiceError::Config(
                "TTS endpoint requires a voice identifier".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(TTS_TIMEOUT)
            .build()
            .map_err(|e| VoiceError::Config(format!("failed to build TTS client: {}", e)))?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &ProviderEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl TextToSpeech for OpenAiTts {
    async fn synthesize(&self, text: &str) -> Result<AudioFrame, VoiceError> {
        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceError::Tts(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_TTS_INPUT_BYTES
            )));
        }
        if text.trim().is_empty() {
            return Ok(AudioFrame::new(Vec::new(), TTS_SAMPLE_RATE));
        }

        let request = SpeechRequest {
            model: &self.endpoint.model,
            voice: self.endpoint.voice.as_deref().unwrap_or_default(),
            input: text,
            response_format: "pcm",
        };

        let response = self
            .client
            .post(self.endpoint.url("audio/speech"))
            .bearer_auth(&self.endpoint.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!(
                "speech synthesis failed (HTTP {}): {}",
                status, body
            )));
        }

        let bytes = response.bytes().await?;
        let frame = AudioFrame::from_pcm_le_bytes(&bytes, TTS_SAMPLE_RATE);
        debug!(
            chars = text.len(),
            duration_ms = frame.duration().as_millis() as u64,
            "speech synthesized"
        );
        Ok(frame)
    }
}

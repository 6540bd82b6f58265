use crate::config::ProviderEndpoint;
use crate::error::VoiceError;
use async_trait::async_trait;
use mileva_types::AudioFrame;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

/// Maximum audio input size for STT (10 MiB). Prevents OOM from oversized payloads.
const MAX_STT_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Timeout for a transcription request.
const STT_TIMEOUT: Duration = Duration::from_secs(120);

/// Speech-to-text provider.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribes one complete utterance.
    async fn transcribe(&self, audio: &AudioFrame) -> Result<String, VoiceError>;
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Client for an OpenAI-compatible `/audio/transcriptions` endpoint
/// (e.g. faster-whisper-server).
#[derive(Debug, Clone)]
pub struct OpenAiStt {
    endpoint: ProviderEndpoint,
    client: Client,
}

impl OpenAiStt {
    pub fn new(endpoint: ProviderEndpoint) -> Result<Self, VoiceError> {
        let client = Client::builder()
            .timeout(STT_TIMEOUT)
            .build()
            .map_err(|e| VoiceError::Config(format!("failed to build STT client: {}", e)))?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &ProviderEndpoint {
        &self.endpoint
    }
}

/// Wraps mono s16 samples in a WAV container.
pub fn encode_wav(audio: &AudioFrame) -> Result<Vec<u8>, VoiceError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + audio.samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| VoiceError::Stt(format!("failed to start WAV encoding: {}", e)))?;
        for &sample in &audio.samples {
            writer
                .write_sample(sample)
                .map_err(|e| VoiceError::Stt(format!("failed to encode WAV sample: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| VoiceError::Stt(format!("failed to finalize WAV: {}", e)))?;
    }
    Ok(cursor.into_inner())
}

#[async_trait]
impl SpeechToText for OpenAiStt {
    async fn transcribe(&self, audio: &AudioFrame) -> Result<String, VoiceError> {
        if audio.is_empty() {
            return Ok(String::new());
        }

        let wav = encode_wav(audio)?;
        if wav.len() > MAX_STT_INPUT_BYTES {
            return Err(VoiceError::Stt(format!(
                "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
                wav.len(),
                MAX_STT_INPUT_BYTES
            )));
        }

        let part = Part::bytes(wav)
            .file_name("utterance.wav")
            .mime_str("audio/wav")?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.endpoint.model.clone())
            .text("response_format", "json");

        let response = self
            .client
            .post(self.endpoint.url("audio/transcriptions"))
            .bearer_auth(&self.endpoint.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Stt(format!(
                "transcription failed (HTTP {}): {}",
                status, body
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::Stt(format!("invalid transcription response: {}", e)))?;

        let text = parsed.text.trim().to_string();
        debug!(
            chars = text.len(),
            duration_ms = audio.duration().as_millis() as u64,
            "utterance transcribed"
        );
        Ok(text)
    }
}

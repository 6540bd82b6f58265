//! Worker hooks: process warm-up and the per-job entrypoint that assembles
//! and starts the voice session.

use crate::config::Config;
use crate::job::{JobContext, JobError, JobProcess};
use crate::persona::assistant;
use crate::worker::Worker;
use mileva_voice::{
    AgentSession, LiveKitService, OpenAiLlm, OpenAiStt, OpenAiTts, ProviderEndpoint,
    TurnDetection, Vad, VadOptions, VoiceError,
};
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};

pub const STT_BASE_URL: &str = "http://whisper:80/v1";
pub const STT_MODEL: &str = "Systran/faster-whisper-small";
pub const TTS_BASE_URL: &str = "http://kokoro:8880/v1";
pub const TTS_MODEL: &str = "kokoro";
pub const TTS_VOICE: &str = "af_nova";
pub const DEFAULT_LLAMA_MODEL: &str = "qwen3-4b";
pub const DEFAULT_LLAMA_BASE_URL: &str = "http://llama_cpp:11434/v1";
/// The self-hosted services ignore credentials but the API requires one.
pub const PLACEHOLDER_API_KEY: &str = "no-key-needed";

/// Where each provider of a session is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub stt: ProviderEndpoint,
    pub llm: ProviderEndpoint,
    pub tts: ProviderEndpoint,
}

impl ProviderEndpoints {
    /// Reads `LLAMA_MODEL` and `LLAMA_BASE_URL` from the process environment.
    pub fn from_env() -> Self {
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// Only the language model is configurable; speech endpoints are fixed.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let llm_model =
            lookup("LLAMA_MODEL").unwrap_or_else(|| DEFAULT_LLAMA_MODEL.to_string());
        let llm_base_url =
            lookup("LLAMA_BASE_URL").unwrap_or_else(|| DEFAULT_LLAMA_BASE_URL.to_string());

        Self {
            stt: ProviderEndpoint::new(STT_BASE_URL, STT_MODEL, PLACEHOLDER_API_KEY),
            llm: ProviderEndpoint::new(llm_base_url, llm_model, PLACEHOLDER_API_KEY),
            tts: ProviderEndpoint::new(TTS_BASE_URL, TTS_MODEL, PLACEHOLDER_API_KEY)
                .with_voice(TTS_VOICE),
        }
    }
}

/// Setup hook: loads the voice activity detector once per worker.
pub fn prewarm() -> Result<JobProcess, VoiceError> {
    Ok(JobProcess::new(Vad::load(VadOptions::default())?))
}

/// Assembles a session from the endpoints and the worker's shared detector.
pub fn build_session(
    endpoints: &ProviderEndpoints,
    vad: Arc<Vad>,
) -> Result<AgentSession, VoiceError> {
    AgentSession::builder()
        .stt(Arc::new(OpenAiStt::new(endpoints.stt.clone())?))
        .llm(Arc::new(OpenAiLlm::new(endpoints.llm.clone())?))
        .tts(Arc::new(OpenAiTts::new(endpoints.tts.clone())?))
        .vad(vad)
        .turn_detection(TurnDetection::multilingual())
        .preemptive_generation(true)
        .build()
}

/// Job entrypoint: starts Tina's session in the job's room, then joins it.
///
/// Every log line of the job carries the room name.
pub async fn my_agent(ctx: JobContext) -> Result<(), JobError> {
    let span = info_span!("job", room = %ctx.room().name(), job_id = %ctx.id());
    async move {
        let endpoints = ProviderEndpoints::from_env();
        debug!(?endpoints, "resolved provider endpoints");

        let session = build_session(&endpoints, ctx.proc().vad())?;
        session.start(assistant(), ctx.room()).await?;
        ctx.connect().await?;

        info!(session_id = %session.id(), identity = %ctx.identity(), "agent joined room");
        Ok(())
    }
    .instrument(span)
    .await
}

/// A worker wired with [`prewarm`] and [`my_agent`].
pub fn worker(config: &Config) -> Worker {
    Worker::new(
        prewarm,
        my_agent,
        LiveKitService::new(config.livekit.clone()),
        config.agent.identity.clone(),
    )
}

//! Voice framework for the Mileva agent.
//!
//! Provides the pieces an agent session is assembled from: OpenAI-compatible
//! provider clients for speech-to-text, language-model inference and
//! text-to-speech, an energy-based voice-activity detector, turn detection,
//! the room handle the agent joins through LiveKit, the persona/tool
//! abstractions, and the [`AgentSession`] runtime that drives a conversation.
//!
//! Audio transport (WebRTC media) is outside this crate: a [`Room`] exposes
//! participant audio as an in-process queue and publishes the agent's
//! speech on a broadcast channel.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod room;
pub mod service;
pub mod session;
pub mod stt;
pub mod tool;
pub mod tts;
pub mod turn;
pub mod vad;

pub use agent::Agent;
pub use config::{
    LiveKitConfig, ProviderEndpoint, DEV_LIVEKIT_API_KEY, DEV_LIVEKIT_API_SECRET, DEV_LIVEKIT_URL,
};
pub use error::VoiceError;
pub use llm::{ChatCompletion, LanguageModel, OpenAiLlm};
pub use room::Room;
pub use service::LiveKitService;
pub use session::{AgentSession, AgentSessionBuilder, SessionEvent, SessionOptions};
pub use stt::{OpenAiStt, SpeechToText};
pub use tool::{FunctionTool, RunContext, ToolError};
pub use tts::{OpenAiTts, TextToSpeech};
pub use turn::{EndpointingOptions, TurnDetection};
pub use vad::{Vad, VadEvent, VadOptions, VadStream};

//! The agent session: one running conversation in one room.
//!
//! A session owns the provider clients for its conversation and drives the
//! listen → transcribe → think → speak loop on a background task:
//!
//! 1. participant audio is fed through the session's [`VadStream`];
//! 2. each finished utterance is transcribed and appended to the pending
//!    user turn, and the turn detector picks an endpointing delay;
//! 3. with preemptive generation the first completion starts right away and
//!    is discarded if the participant resumes speaking;
//! 4. once the delay passes the turn is committed, tool calls are resolved
//!    and the reply is synthesized and published to the room.
//!
//! The session ends when the participant audio ends or the room is closed.

use crate::agent::Agent;
use crate::error::VoiceError;
use crate::llm::{strip_think_blocks, ChatCompletion, LanguageModel};
use crate::room::Room;
use crate::stt::SpeechToText;
use crate::tool::{parse_arguments, RunContext, ToolError};
use crate::tts::TextToSpeech;
use crate::turn::TurnDetection;
use crate::vad::{Vad, VadEvent, VadStream};
use mileva_types::{AudioFrame, ChatMessage, ToolCall};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Default number of tool-call rounds per user turn.
const DEFAULT_MAX_TOOL_STEPS: usize = 3;

/// Default capacity for the session event broadcast channel.
const DEFAULT_EVENT_BROADCAST_CAPACITY: usize = 256;

/// Observable progress of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started { room: String },
    UserSpeechStarted,
    /// Transcript of the pending user turn; `is_final` once committed.
    UserTranscript { text: String, is_final: bool },
    ToolExecuted { name: String, output: String },
    AgentReply { text: String },
    Error { message: String },
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Start the completion as soon as a transcript arrives instead of
    /// waiting for the endpointing delay.
    pub preemptive_generation: bool,
    /// Tool-call rounds allowed per user turn.
    pub max_tool_steps: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            preemptive_generation: false,
            max_tool_steps: DEFAULT_MAX_TOOL_STEPS,
        }
    }
}

#[derive(Default)]
pub struct AgentSessionBuilder {
    stt: Option<Arc<dyn SpeechToText>>,
    llm: Option<Arc<dyn LanguageModel>>,
    tts: Option<Arc<dyn TextToSpeech>>,
    vad: Option<Arc<Vad>>,
    turn_detection: TurnDetection,
    options: SessionOptions,
}

impl AgentSessionBuilder {
    pub fn stt(mut self, stt: Arc<dyn SpeechToText>) -> Self {
        self.stt = Some(stt);
        self
    }

    pub fn llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn tts(mut self, tts: Arc<dyn TextToSpeech>) -> Self {
        self.tts = Some(tts);
        self
    }

    /// The shared detector; the session only reads it.
    pub fn vad(mut self, vad: Arc<Vad>) -> Self {
        self.vad = Some(vad);
        self
    }

    pub fn turn_detection(mut self, turn_detection: TurnDetection) -> Self {
        self.turn_detection = turn_detection;
        self
    }

    pub fn preemptive_generation(mut self, enabled: bool) -> Self {
        self.options.preemptive_generation = enabled;
        self
    }

    pub fn max_tool_steps(mut self, steps: usize) -> Self {
        self.options.max_tool_steps = steps;
        self
    }

    pub fn build(self) -> Result<AgentSession, VoiceError> {
        let missing = |what: &str| VoiceError::Config(format!("session requires {}", what));
        let (events, _) = broadcast::channel(DEFAULT_EVENT_BROADCAST_CAPACITY);

        Ok(AgentSession {
            id: Uuid::new_v4(),
            stt: self.stt.ok_or_else(|| missing("a speech-to-text provider"))?,
            llm: self.llm.ok_or_else(|| missing("a language model"))?,
            tts: self.tts.ok_or_else(|| missing("a text-to-speech provider"))?,
            vad: self.vad.ok_or_else(|| missing("a voice activity detector"))?,
            turn_detection: self.turn_detection,
            options: self.options,
            events,
            task: Mutex::new(None),
        })
    }
}

/// A conversation runtime bound to its providers.
pub struct AgentSession {
    id: Uuid,
    stt: Arc<dyn SpeechToText>,
    llm: Arc<dyn LanguageModel>,
    tts: Arc<dyn TextToSpeech>,
    vad: Arc<Vad>,
    turn_detection: TurnDetection,
    options: SessionOptions,
    events: broadcast::Sender<SessionEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentSession")
            .field("id", &self.id)
            .field("turn_detection", &self.turn_detection)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl AgentSession {
    pub fn builder() -> AgentSessionBuilder {
        AgentSessionBuilder::default()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn turn_detection(&self) -> TurnDetection {
        self.turn_detection
    }

    pub fn vad(&self) -> &Arc<Vad> {
        &self.vad
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Starts the conversation with `agent` in `room`.
    ///
    /// Returns once the session task is running; the conversation continues
    /// until the room's participant audio ends or the room is closed.
    pub async fn start(&self, agent: Agent, room: Arc<Room>) -> Result<(), VoiceError> {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return Err(VoiceError::Room(format!(
                "session {} has already been started",
                self.id
            )));
        }

        let input = room.take_audio_input()?;
        let mut chat = Vec::new();
        if !agent.instructions().is_empty() {
            chat.push(ChatMessage::system(agent.instructions()));
        }

        let driver = SessionDriver {
            id: self.id,
            stt: Arc::clone(&self.stt),
            llm: Arc::clone(&self.llm),
            tts: Arc::clone(&self.tts),
            vad_stream: self.vad.stream(),
            turn_detection: self.turn_detection,
            options: self.options,
            events: self.events.clone(),
            tool_definitions: agent.tool_definitions(),
            agent,
            room: Arc::clone(&room),
            chat,
        };

        info!(
            session_id = %self.id,
            room = %room.name(),
            preemptive = self.options.preemptive_generation,
            "agent session started"
        );
        let _ = self.events.send(SessionEvent::Started {
            room: room.name().to_string(),
        });
        *task = Some(tokio::spawn(driver.run(input)));
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Waits for the conversation to end. Returns immediately if the session
    /// was never started.
    pub async fn wait_closed(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(session_id = %self.id, "session task failed: {}", e);
            }
        }
    }
}

#[derive(Default)]
struct PendingTurn {
    transcript: String,
    deadline: Option<Instant>,
    preemptive: Option<JoinHandle<Result<ChatCompletion, VoiceError>>>,
}

impl PendingTurn {
    fn cancel_preemptive(&mut self) {
        if let Some(handle) = self.preemptive.take() {
            handle.abort();
            debug!("preemptive generation discarded");
        }
    }
}

struct SessionDriver {
    id: Uuid,
    stt: Arc<dyn SpeechToText>,
    llm: Arc<dyn LanguageModel>,
    tts: Arc<dyn TextToSpeech>,
    vad_stream: VadStream,
    turn_detection: TurnDetection,
    options: SessionOptions,
    events: broadcast::Sender<SessionEvent>,
    agent: Agent,
    tool_definitions: Vec<Value>,
    room: Arc<Room>,
    chat: Vec<ChatMessage>,
}

impl SessionDriver {
    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    async fn run(mut self, mut input: mpsc::Receiver<AudioFrame>) {
        let mut pending: Option<PendingTurn> = None;
        let room = Arc::clone(&self.room);

        loop {
            let deadline = pending.as_ref().and_then(|turn| turn.deadline);
            tokio::select! {
                () = room.wait_closed() => break,
                frame = input.recv() => {
                    let Some(frame) = frame else { break };
                    self.on_frame(&frame, &mut pending).await;
                }
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(turn) = pending.take() {
                        // A reply in flight does not keep a closed room alive.
                        tokio::select! {
                            () = room.wait_closed() => break,
                            () = self.commit_turn(turn) => {}
                        }
                    }
                }
            }
        }

        if let Some(mut turn) = pending.take() {
            turn.cancel_preemptive();
        }
        self.room.close();
        info!(session_id = %self.id, room = %self.room.name(), "agent session closed");
        self.emit(SessionEvent::Closed);
    }

    async fn on_frame(&mut self, frame: &AudioFrame, pending: &mut Option<PendingTurn>) {
        match self.vad_stream.push_frame(frame) {
            Some(VadEvent::StartOfSpeech) => {
                self.emit(SessionEvent::UserSpeechStarted);
                if let Some(turn) = pending.as_mut() {
                    turn.deadline = None;
                    turn.cancel_preemptive();
                }
            }
            Some(VadEvent::EndOfSpeech(utterance)) => {
                let text = match self.stt.transcribe(&utterance).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(session_id = %self.id, "transcription failed: {}", e);
                        self.emit(SessionEvent::Error {
                            message: e.to_string(),
                        });
                        String::new()
                    }
                };

                if !text.is_empty() {
                    let turn = pending.get_or_insert_with(PendingTurn::default);
                    if !turn.transcript.is_empty() {
                        turn.transcript.push(' ');
                    }
                    turn.transcript.push_str(&text);
                    self.emit(SessionEvent::UserTranscript {
                        text: turn.transcript.clone(),
                        is_final: false,
                    });
                }

                let Some(turn) = pending.as_mut() else { return };
                if text.is_empty() && turn.deadline.is_some() {
                    return;
                }

                let delay = self.turn_detection.endpointing_delay(&turn.transcript);
                turn.deadline = Some(Instant::now() + delay);
                debug!(
                    session_id = %self.id,
                    delay_ms = delay.as_millis() as u64,
                    "end of speech, awaiting end of turn"
                );

                if self.options.preemptive_generation {
                    turn.cancel_preemptive();
                    turn.preemptive = Some(self.spawn_completion(&turn.transcript));
                }
            }
            None => {}
        }
    }

    fn spawn_completion(
        &self,
        transcript: &str,
    ) -> JoinHandle<Result<ChatCompletion, VoiceError>> {
        let mut messages = self.chat.clone();
        messages.push(ChatMessage::user(transcript));
        let tools = self.tool_definitions.clone();
        let llm = Arc::clone(&self.llm);
        tokio::spawn(async move { llm.chat(&messages, &tools).await })
    }

    async fn commit_turn(&mut self, turn: PendingTurn) {
        self.emit(SessionEvent::UserTranscript {
            text: turn.transcript.clone(),
            is_final: true,
        });
        self.chat.push(ChatMessage::user(&turn.transcript));

        let first = match turn.preemptive {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(VoiceError::Llm(format!("preemptive generation failed: {}", e))),
            },
            None => self.llm.chat(&self.chat, &self.tool_definitions).await,
        };

        match self.resolve_reply(first).await {
            Ok(Some(reply)) => self.speak(reply).await,
            Ok(None) => debug!(session_id = %self.id, "model produced no spoken reply"),
            Err(e) => {
                error!(session_id = %self.id, "failed to generate reply: {}", e);
                self.emit(SessionEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    /// Runs tool-call rounds until the model answers in text or the step
    /// limit is reached.
    async fn resolve_reply(
        &mut self,
        first: Result<ChatCompletion, VoiceError>,
    ) -> Result<Option<String>, VoiceError> {
        let mut completion = first?;
        let mut steps = 0;

        while completion.has_tool_calls() {
            if steps >= self.options.max_tool_steps {
                warn!(
                    session_id = %self.id,
                    max_tool_steps = self.options.max_tool_steps,
                    "tool step limit reached"
                );
                break;
            }
            steps += 1;

            self.chat.push(ChatMessage::assistant_tool_calls(
                completion.content.clone(),
                completion.tool_calls.clone(),
            ));
            for call in &completion.tool_calls {
                let output = self.run_tool(call).await;
                self.chat.push(ChatMessage::tool_output(&call.id, output));
            }

            completion = self.llm.chat(&self.chat, &self.tool_definitions).await?;
        }

        let reply = completion
            .content
            .as_deref()
            .map(strip_think_blocks)
            .unwrap_or_default();
        if reply.is_empty() {
            return Ok(None);
        }
        self.chat.push(ChatMessage::assistant(&reply));
        Ok(Some(reply))
    }

    async fn run_tool(&self, call: &ToolCall) -> String {
        let name = call.function.name.as_str();
        let ctx = RunContext {
            session_id: self.id,
            room: self.room.name().to_string(),
        };

        let result = match self.agent.find_tool(name) {
            None => Err(ToolError::NotFound(name.to_string())),
            Some(tool) => match parse_arguments(name, &call.function.arguments) {
                Ok(arguments) => tool.call(&ctx, arguments).await,
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(output) => {
                info!(session_id = %self.id, tool = name, "tool executed");
                self.emit(SessionEvent::ToolExecuted {
                    name: name.to_string(),
                    output: output.clone(),
                });
                output
            }
            Err(e) => {
                warn!(session_id = %self.id, tool = name, "tool call failed: {}", e);
                format!("error: {}", e)
            }
        }
    }

    async fn speak(&self, reply: String) {
        match self.tts.synthesize(&reply).await {
            Ok(frame) if !frame.is_empty() => {
                if let Err(e) = self.room.publish_audio(frame) {
                    warn!(session_id = %self.id, "failed to publish reply audio: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!(session_id = %self.id, "speech synthesis failed: {}", e);
                self.emit(SessionEvent::Error {
                    message: e.to_string(),
                });
            }
        }
        self.emit(SessionEvent::AgentReply { text: reply });
    }
}

use crate::error::VoiceError;
use crate::service::LiveKitService;
use mileva_types::AudioFrame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::info;

/// Capacity of the participant audio queue feeding a session.
const DEFAULT_AUDIO_INPUT_CAPACITY: usize = 512;

/// Capacity of the agent audio broadcast.
const DEFAULT_AUDIO_OUTPUT_CAPACITY: usize = 64;

/// The agent's handle on one LiveKit room.
///
/// Participant audio arrives on an in-process queue and the agent's speech
/// leaves on a broadcast channel; WebRTC media transport sits outside this
/// crate. Only one session may consume the participant audio.
#[derive(Debug)]
pub struct Room {
    name: String,
    connected: AtomicBool,
    token: Mutex<Option<String>>,
    audio_input: Mutex<Option<mpsc::Receiver<AudioFrame>>>,
    audio_output: broadcast::Sender<AudioFrame>,
    closed: watch::Sender<bool>,
}

impl Room {
    /// Creates a room and returns the sender for participant audio. Dropping
    /// the sender ends the conversation.
    pub fn new(name: impl Into<String>) -> (Arc<Self>, mpsc::Sender<AudioFrame>) {
        let (input_tx, input_rx) = mpsc::channel(DEFAULT_AUDIO_INPUT_CAPACITY);
        let (output_tx, _) = broadcast::channel(DEFAULT_AUDIO_OUTPUT_CAPACITY);
        let (closed_tx, _) = watch::channel(false);

        let room = Arc::new(Self {
            name: name.into(),
            connected: AtomicBool::new(false),
            token: Mutex::new(None),
            audio_input: Mutex::new(Some(input_rx)),
            audio_output: output_tx,
            closed: closed_tx,
        });
        (room, input_tx)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// The join token issued on connect, if connected.
    pub fn token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Joins the room as `identity` using a token issued by `livekit`.
    pub async fn connect(&self, livekit: &LiveKitService, identity: &str) -> Result<(), VoiceError> {
        if self.is_closed() {
            return Err(VoiceError::Room(format!("room '{}' is closed", self.name)));
        }

        let token = livekit.agent_token(&self.name, identity)?;
        info!(
            room = %self.name,
            url = livekit.url(),
            token_len = token.len(),
            "agent joined room"
        );

        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    /// Hands the participant audio queue to a session. Fails if a session
    /// already holds it.
    pub fn take_audio_input(&self) -> Result<mpsc::Receiver<AudioFrame>, VoiceError> {
        self.audio_input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| {
                VoiceError::Room(format!("room '{}' already has an active session", self.name))
            })
    }

    /// Publishes agent audio to the room.
    pub fn publish_audio(&self, frame: AudioFrame) -> Result<(), VoiceError> {
        if !self.is_connected() {
            return Err(VoiceError::Room(format!(
                "agent is not connected to room '{}'",
                self.name
            )));
        }

        // No subscribers is not an error: nobody is listening yet.
        let _ = self.audio_output.send(frame);
        Ok(())
    }

    /// Subscribes to the agent audio published in this room.
    pub fn subscribe_audio(&self) -> broadcast::Receiver<AudioFrame> {
        self.audio_output.subscribe()
    }

    /// Marks the room closed and disconnects the agent.
    pub fn close(&self) {
        if !self.closed.send_replace(true) {
            info!(room = %self.name, "room closed");
        }
        self.connected.store(false, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once [`Room::close`] has been called.
    pub async fn wait_closed(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives as long as `self`, so this only returns on close.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

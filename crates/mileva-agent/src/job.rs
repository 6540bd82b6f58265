//! Per-job context handed to the entrypoint.

use mileva_voice::{LiveKitService, Room, Vad, VoiceError};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// State built once per worker by the setup hook and shared read-only by
/// every job the worker runs.
#[derive(Debug)]
pub struct JobProcess {
    vad: Arc<Vad>,
}

impl JobProcess {
    pub fn new(vad: Vad) -> Self {
        Self { vad: Arc::new(vad) }
    }

    /// The pre-loaded voice activity detector.
    pub fn vad(&self) -> Arc<Vad> {
        Arc::clone(&self.vad)
    }
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Voice(#[from] VoiceError),
}

/// Everything a job entrypoint needs: its room, the pre-warmed process
/// state, and the means to join the room.
pub struct JobContext {
    id: Uuid,
    room: Arc<Room>,
    process: Arc<JobProcess>,
    livekit: Arc<LiveKitService>,
    identity: String,
}

impl JobContext {
    pub fn new(
        id: Uuid,
        room: Arc<Room>,
        process: Arc<JobProcess>,
        livekit: Arc<LiveKitService>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            id,
            room,
            process,
            livekit,
            identity: identity.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn room(&self) -> Arc<Room> {
        Arc::clone(&self.room)
    }

    pub fn proc(&self) -> &JobProcess {
        &self.process
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Joins the room as the agent participant.
    pub async fn connect(&self) -> Result<(), VoiceError> {
        self.room.connect(&self.livekit, &self.identity).await
    }
}

//! The agent worker: warms up once, then runs one task per dispatched job.

use crate::job::{JobContext, JobError, JobProcess};
use chrono::{DateTime, Utc};
use mileva_types::AudioFrame;
use mileva_voice::{LiveKitService, Room, VoiceError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::{mpsc, OnceCell};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

type SetupFn = dyn Fn() -> Result<JobProcess, VoiceError> + Send + Sync;
type EntrypointFuture = Pin<Box<dyn Future<Output = Result<(), JobError>> + Send>>;
type EntrypointFn = dyn Fn(JobContext) -> EntrypointFuture + Send + Sync;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("worker has not been warmed up")]
    NotWarmedUp,

    #[error("worker setup failed: {0}")]
    Setup(#[source] VoiceError),

    #[error("invalid room name: {0:?}")]
    InvalidRoom(String),

    #[error("job {0} not found")]
    JobNotFound(Uuid),
}

/// Public view of a running job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: Uuid,
    pub room: String,
    pub started_at: DateTime<Utc>,
}

struct ActiveJob {
    info: JobInfo,
    room: Arc<Room>,
    /// Feeds participant audio into the room; dropping it ends the session.
    participant: Option<mpsc::Sender<AudioFrame>>,
}

pub struct Worker {
    setup: Box<SetupFn>,
    entrypoint: Arc<EntrypointFn>,
    livekit: Arc<LiveKitService>,
    identity: String,
    process: OnceCell<Arc<JobProcess>>,
    /// Uses `std::sync::RwLock`: every acquisition is a brief map operation
    /// that never spans an `.await`.
    jobs: Arc<RwLock<HashMap<Uuid, ActiveJob>>>,
    tasks: Mutex<JoinSet<()>>,
}

impl Worker {
    pub fn new<S, E, F>(setup: S, entrypoint: E, livekit: LiveKitService, identity: impl Into<String>) -> Self
    where
        S: Fn() -> Result<JobProcess, VoiceError> + Send + Sync + 'static,
        E: Fn(JobContext) -> F + Send + Sync + 'static,
        F: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        Self {
            setup: Box::new(setup),
            entrypoint: Arc::new(move |ctx| Box::pin(entrypoint(ctx)) as EntrypointFuture),
            livekit: Arc::new(livekit),
            identity: identity.into(),
            process: OnceCell::new(),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Runs the setup hook once. Concurrent and repeated callers all get the
    /// same process state; a failed setup is returned and may be retried.
    pub async fn prewarm(&self) -> Result<Arc<JobProcess>, WorkerError> {
        let process = self
            .process
            .get_or_try_init(|| async {
                let process = (self.setup)().map_err(WorkerError::Setup)?;
                info!(identity = %self.identity, "worker warmed up");
                Ok::<_, WorkerError>(Arc::new(process))
            })
            .await?;
        Ok(Arc::clone(process))
    }

    pub fn is_warm(&self) -> bool {
        self.process.initialized()
    }

    /// Starts a job for `room_name` and returns immediately.
    pub fn dispatch(&self, room_name: &str) -> Result<JobInfo, WorkerError> {
        let process = self.process.get().cloned().ok_or(WorkerError::NotWarmedUp)?;
        let room_name = room_name.trim();
        if room_name.is_empty() {
            return Err(WorkerError::InvalidRoom(room_name.to_string()));
        }

        let (room, participant) = Room::new(room_name);
        let info = JobInfo {
            id: Uuid::new_v4(),
            room: room_name.to_string(),
            started_at: Utc::now(),
        };
        let ctx = JobContext::new(
            info.id,
            Arc::clone(&room),
            process,
            Arc::clone(&self.livekit),
            self.identity.clone(),
        );

        self.jobs.write().unwrap_or_else(PoisonError::into_inner).insert(
            info.id,
            ActiveJob {
                info: info.clone(),
                room: Arc::clone(&room),
                participant: Some(participant),
            },
        );

        let jobs = Arc::clone(&self.jobs);
        let entrypoint = Arc::clone(&self.entrypoint);
        let job_id = info.id;
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            match entrypoint(ctx).await {
                Ok(()) => room.wait_closed().await,
                Err(e) => {
                    error!(job_id = %job_id, room = %room.name(), "job entrypoint failed: {}", e);
                    room.close();
                }
            }
            jobs.write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&job_id);
            info!(job_id = %job_id, room = %room.name(), "job finished");
        });

        info!(job_id = %info.id, room = %info.room, "job dispatched");
        Ok(info)
    }

    /// The sender feeding participant audio into a job's room.
    pub fn participant_audio(&self, id: Uuid) -> Result<mpsc::Sender<AudioFrame>, WorkerError> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .and_then(|job| job.participant.clone())
            .ok_or(WorkerError::JobNotFound(id))
    }

    /// Ends a job: participant audio stops and its room closes.
    pub fn end_job(&self, id: Uuid) -> Result<(), WorkerError> {
        let room = {
            let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
            let job = jobs.get_mut(&id).ok_or(WorkerError::JobNotFound(id))?;
            job.participant = None;
            Arc::clone(&job.room)
        };
        room.close();
        info!(job_id = %id, room = %room.name(), "job ended");
        Ok(())
    }

    /// Waits until a job's room closes. Returns immediately if the job is
    /// not running.
    pub async fn wait_job(&self, id: Uuid) {
        let room = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|job| Arc::clone(&job.room));
        if let Some(room) = room {
            room.wait_closed().await;
        }
    }

    /// Snapshot of active jobs, oldest first.
    pub fn jobs(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|job| job.info.clone())
            .collect();
        jobs.sort_by_key(|job| job.started_at);
        jobs
    }

    /// Ends every job and waits for their tasks to finish.
    pub async fn shutdown(&self) {
        let ids: Vec<Uuid> = self.jobs().into_iter().map(|job| job.id).collect();
        for id in ids {
            // A job may finish on its own between the snapshot and here.
            let _ = self.end_job(id);
        }

        let mut tasks =
            std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!("job task failed: {}", e);
            }
        }
        info!("worker shut down");
    }
}

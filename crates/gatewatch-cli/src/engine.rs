use chrono::DateTime;
use chrono_tz::Tz;
use gatewatch_core::{
    AccessEvent, AccessStatus, EuclideanComparator, EventLog, EventLogError, EventRecorder,
    FeatureVector, Session, TickOutcome,
};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("event log error: {0}")]
    EventLog(#[from] EventLogError),
    #[error("failed to spawn session thread: {0}")]
    Spawn(std::io::Error),
    #[error("session thread exited")]
    ChannelClosed,
}

/// Snapshot of the running session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub identities: usize,
    /// Identity matching the session's authorized face, if seen.
    pub authorized: Option<String>,
    pub latest_status: Option<AccessStatus>,
}

/// Messages sent from async callers to the session thread.
enum EngineRequest {
    Start {
        reply: oneshot::Sender<SessionStatus>,
    },
    Tick {
        faces: Vec<FeatureVector>,
        at: DateTime<Tz>,
        reply: oneshot::Sender<TickOutcome>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    Recent {
        reply: oneshot::Sender<Vec<AccessEvent>>,
    },
}

/// Clone-safe handle to the session thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Reset to a fresh session. Ticks sent after this call belong to it.
    pub async fn start(&self) -> Result<SessionStatus, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Start { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Hand one sampled frame's faces to the session.
    pub async fn tick(
        &self,
        faces: Vec<FeatureVector>,
        at: DateTime<Tz>,
    ) -> Result<TickOutcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Tick {
            faces,
            at,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn status(&self) -> Result<SessionStatus, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Status { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Latest recorded events, most recent first.
    pub async fn recent(&self) -> Result<Vec<AccessEvent>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Recent { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    async fn send(&self, req: EngineRequest) -> Result<(), EngineError> {
        self.tx.send(req).await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the session on a dedicated OS thread.
///
/// Opens the event log synchronously (fail-fast), then serves requests one
/// at a time, so session state is never touched concurrently.
pub fn spawn_engine(log_path: &Path) -> Result<EngineHandle, EngineError> {
    let log = EventLog::open(log_path)?;
    tracing::info!(path = %log_path.display(), "event log opened");

    let mut session = Session::start(EuclideanComparator, EventRecorder::new(log));
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("gatewatch-session".into())
        .spawn(move || {
            tracing::info!("session thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Start { reply } => {
                        session.reset();
                        let _ = reply.send(status_of(&session));
                    }
                    EngineRequest::Tick { faces, at, reply } => {
                        let outcome = session.tick(&faces, at);
                        let _ = reply.send(outcome);
                    }
                    EngineRequest::Status { reply } => {
                        let _ = reply.send(status_of(&session));
                    }
                    EngineRequest::Recent { reply } => {
                        let _ = reply.send(session.recorder().recent().cloned().collect());
                    }
                }
            }
            tracing::info!("session thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

fn status_of(session: &Session<EuclideanComparator>) -> SessionStatus {
    SessionStatus {
        session_id: session.id().to_string(),
        identities: session.registry().len(),
        authorized: session.authorized_label().map(str::to_string),
        latest_status: session.latest_status(),
    }
}

use std::fmt::Display;

use log::{
    debug,
    info,
    warn,
};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
};
use uuid::Uuid;

/// Human readable progress of a job, for whoever is watching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Rendering,
    Connecting,
    Printing,
    Done,
    Failed(String),
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Rendering => write!(f, "rendering label image"),
            Phase::Connecting => write!(f, "connecting to printer"),
            Phase::Printing => write!(f, "printing"),
            Phase::Done => write!(f, "print complete"),
            Phase::Failed(reason) => write!(f, "print error: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Started { job_id: Uuid },
    Status { job_id: Uuid, phase: Phase },
    Finished { job_id: Uuid },
}

impl JobEvent {
    pub fn job_id(&self) -> Uuid {
        match self {
            JobEvent::Started { job_id } | JobEvent::Status { job_id, .. } | JobEvent::Finished { job_id } => *job_id,
        }
    }
}

/// Fan-out of job lifecycle events. Publishing never waits on observers; an
/// observer that falls more than `capacity` events behind loses the oldest.
#[derive(Debug, Clone)]
pub struct EventNotifier {
    tx: broadcast::Sender<JobEvent>,
}

impl EventNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    pub fn job_started(&self, job_id: Uuid) {
        self.publish(JobEvent::Started { job_id });
    }

    pub fn status(&self, job_id: Uuid, phase: Phase) {
        self.publish(JobEvent::Status { job_id, phase });
    }

    pub fn job_finished(&self, job_id: Uuid) {
        self.publish(JobEvent::Finished { job_id });
    }

    fn publish(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Observer that writes one log line per event until the notifier is dropped.
pub fn spawn_event_logger(notifier: &EventNotifier) -> JoinHandle<()> {
    let mut rx = notifier.subscribe();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(JobEvent::Started { job_id }) => info!("Job {} started", job_id),
                Ok(JobEvent::Status { job_id, phase }) => info!("Job {}: {}", job_id, phase),
                Ok(JobEvent::Finished { job_id }) => info!("Job {} finished", job_id),
                Err(broadcast::error::RecvError::Lagged(n)) => warn!("Event logger skipped {} events", n),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Event logger stopped");
    })
}

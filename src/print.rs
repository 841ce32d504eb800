use std::sync::Arc;

use log::{
    error,
    info,
};
use tokio::{
    sync::{
        Mutex,
        MutexGuard,
    },
    time::sleep,
};
use uuid::Uuid;

use crate::{
    config::Pacing,
    error::{
        PrintError,
        RenderError,
        ServerError,
    },
    events::{
        EventNotifier,
        Phase,
    },
    model::{
        Job,
        JobResult,
    },
    render::{
        Bitmap,
        Renderer,
    },
    sink::{
        SinkDriver,
        SinkSession,
    },
};

/// Document name shown in the printer queue.
pub const DOCUMENT_TITLE: &str = "Label Print";

/// Held by a connection from "job started" to "job finished", so that whole
/// job lifecycles never interleave.
pub type JobSlot<'a> = MutexGuard<'a, ()>;

/// Owns the printer. Jobs go in, results come out, and the
/// open, write, close sequence never runs for two jobs at once.
pub struct PrintSerializer {
    printer: String,
    renderer: Arc<dyn Renderer>,
    sink: Arc<Mutex<Box<dyn SinkDriver>>>,
    lifecycle: Mutex<()>,
    notifier: EventNotifier,
    pacing: Pacing,
}

impl PrintSerializer {
    pub fn new(
        printer: impl Into<String>,
        renderer: Arc<dyn Renderer>,
        sink: Box<dyn SinkDriver>,
        notifier: EventNotifier,
        pacing: Pacing,
    ) -> Self {
        Self {
            printer: printer.into(),
            renderer,
            sink: Arc::new(Mutex::new(sink)),
            lifecycle: Mutex::new(()),
            notifier,
            pacing,
        }
    }

    /// Wait until no other job is in flight.
    pub async fn reserve(&self) -> JobSlot<'_> {
        self.lifecycle.lock().await
    }

    /// Render and print `job`. Never fails; problems are reported in the
    /// result.
    pub async fn submit(&self, job: &Job) -> JobResult {
        info!("Printing job {} for {}", job.id, job.source);

        match self.run(job).await {
            Ok(()) => {
                self.notifier.status(job.id, Phase::Done);
                info!("Job {} printed", job.id);
                JobResult::success(job.id)
            }
            Err(e) => {
                let detail = e.to_string();
                self.notifier.status(job.id, Phase::Failed(detail.clone()));
                error!("Job {} failed; error = {}", job.id, detail);
                JobResult::failure(job.id, detail)
            }
        }
    }

    async fn run(&self, job: &Job) -> Result<(), ServerError> {
        self.notifier.status(job.id, Phase::Rendering);
        sleep(self.pacing.render_delay).await;
        let bitmap = self.render(job).await?;

        self.notifier.status(job.id, Phase::Connecting);
        sleep(self.pacing.connect_delay).await;
        self.print(job.id, bitmap).await?;

        Ok(())
    }

    /// Rendering is CPU bound and touches no device state, so it runs on the
    /// blocking pool outside the device lock.
    pub async fn render(&self, job: &Job) -> Result<Bitmap, RenderError> {
        let renderer = Arc::clone(&self.renderer);
        let job = job.clone();

        tokio::task::spawn_blocking(move || renderer.render(&job))
            .await
            .map_err(|e| RenderError::Aborted(e.to_string()))?
    }

    /// Send one page to the printer under the device lock. The printer is
    /// closed again before this returns, whatever the outcome.
    pub async fn print(&self, job_id: Uuid, bitmap: Bitmap) -> Result<(), PrintError> {
        let mut device = Arc::clone(&self.sink).lock_owned().await;
        let printer = self.printer.clone();
        let notifier = self.notifier.clone();

        tokio::task::spawn_blocking(move || {
            let mut session = SinkSession::open(&mut **device, &printer)?;
            notifier.status(job_id, Phase::Printing);
            session.print_page(DOCUMENT_TITLE, &bitmap)
        })
        .await
        .map_err(|e| PrintError::Aborted(e.to_string()))?
    }
}

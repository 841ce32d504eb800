use std::{
    sync::Arc,
    time::Duration,
};

use futures::SinkExt;
use log::{
    debug,
    error,
    info,
    warn,
};
use tokio::{
    io::{
        AsyncRead,
        AsyncWrite,
        AsyncWriteExt,
    },
    time::{
        sleep,
        timeout,
    },
};
use tokio_util::codec::FramedWrite;

use crate::{
    codec::{
        read_request,
        Framing,
        JobCodec,
    },
    config::DEFAULT_MAX_PAYLOAD,
    error::ServerError,
    events::EventNotifier,
    model::{
        Job,
        Response,
    },
    print::PrintSerializer,
};

/// Drives one client connection from first byte to close.
pub struct ConnectionHandler {
    serializer: Arc<PrintSerializer>,
    notifier: EventNotifier,
    framing: Framing,
    max_payload: usize,
    read_timeout: Option<Duration>,
    finish_delay: Duration,
}

impl ConnectionHandler {
    pub fn new(serializer: Arc<PrintSerializer>, notifier: EventNotifier) -> Self {
        Self {
            serializer,
            notifier,
            framing: Framing::default(),
            max_payload: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            finish_delay: Duration::ZERO,
        }
    }

    pub fn framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    pub fn read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn finish_delay(mut self, finish_delay: Duration) -> Self {
        self.finish_delay = finish_delay;
        self
    }

    /// Serve `stream` and close it. Errors end here: they are logged and, when
    /// possible, reported to the client as a JSON error object.
    pub async fn handle<S>(&self, mut stream: S, peer: &str)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if let Err(e) = self.process(&mut stream, peer).await {
            error!("Failed to handle client {}; error = {}", peer, e);
            if let Err(write_err) = self.respond(&mut stream, Response::error(e.to_string())).await {
                debug!("Could not report error to {}; error = {}", peer, write_err);
            }
        }

        if let Err(e) = stream.shutdown().await {
            debug!("Closing connection to {} failed; error = {}", peer, e);
        }
        debug!("Closed connection to {}", peer);
    }

    async fn process<S>(&self, stream: &mut S, peer: &str) -> Result<(), ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let payload = match self.read_timeout {
            Some(limit) => timeout(limit, read_request(stream, self.framing, self.max_payload))
                .await
                .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out waiting for request"))??,
            None => read_request(stream, self.framing, self.max_payload).await?,
        };

        if payload.is_empty() {
            info!("Client {} sent no data", peer);
            return Ok(());
        }

        let job = Job::decode(&payload, peer)?;
        info!("Received job {} from {} [size={}]", job.id, peer, payload.len());

        let _slot = self.serializer.reserve().await;
        self.notifier.job_started(job.id);

        let result = self.serializer.submit(&job).await;
        let response = Response::from(&result);
        let code = String::from_utf8_lossy(&response.to_bytes()).into_owned();
        let written = self.respond(stream, response).await;
        match &written {
            Ok(()) => info!("Sent {} to {} for job {}", code, peer, job.id),
            Err(e) => warn!("Could not send {} to {}; error = {}", code, peer, e),
        }

        sleep(self.finish_delay).await;
        self.notifier.job_finished(job.id);

        written
    }

    async fn respond<S>(&self, stream: &mut S, response: Response) -> Result<(), ServerError>
    where
        S: AsyncWrite + Unpin,
    {
        let mut framed = FramedWrite::new(stream, JobCodec::new(self.max_payload));
        framed.send(response).await
    }
}

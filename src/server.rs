use std::{
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use log::{
    debug,
    error,
    info,
};
use tokio::{
    net::TcpListener,
    sync::{
        watch,
        Semaphore,
    },
    time::sleep,
};

use crate::{
    connection::ConnectionHandler,
    error::{
        Result,
        ServerError,
    },
};

/// Pause after a failed accept so a persistent error (e.g. out of file
/// descriptors) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts clients and runs each one on its own task.
pub struct Listener {
    handler: Arc<ConnectionHandler>,
    admission: Option<Arc<Semaphore>>,
    shutdown: watch::Sender<bool>,
}

impl Listener {
    pub fn new(handler: Arc<ConnectionHandler>) -> Self {
        let (shutdown, _) = watch::channel(false);

        Self {
            handler,
            admission: None,
            shutdown,
        }
    }

    /// Serve at most `limit` connections at once; further clients wait in the
    /// kernel backlog.
    pub fn max_connections(mut self, limit: Option<usize>) -> Self {
        self.admission = limit.map(|n| Arc::new(Semaphore::new(n)));
        self
    }

    pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
        TcpListener::bind((host, port))
            .await
            .map_err(|source| ServerError::Bind {
                addr: format!("{}:{}", host, port),
                source,
            })
    }

    /// Bind and serve until [`Listener::stop`].
    pub async fn start(&self, host: &str, port: u16) -> Result<()> {
        let listener = Self::bind(host, port).await?;
        self.serve(listener).await
    }

    /// Accept on an already bound socket until [`Listener::stop`]. The socket
    /// is closed when this returns; connections already accepted carry on.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let mut stopped = self.shutdown.subscribe();
        if *stopped.borrow_and_update() {
            return Ok(());
        }
        info!("Listening on {}", listener.local_addr()?);

        loop {
            let permit = match &self.admission {
                Some(admission) => tokio::select! {
                    permit = Arc::clone(admission).acquire_owned() => permit.ok(),
                    _ = stopped.changed() => break,
                },
                None => None,
            };

            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!("Client connected: {}", peer);
                        self.dispatch(stream, peer, permit);
                    }
                    Err(e) => {
                        error!("Failed to accept connection; error = {}", e);
                        sleep(ACCEPT_BACKOFF).await;
                    }
                },
                _ = stopped.changed() => break,
            }
        }

        info!("Listener stopped");
        Ok(())
    }

    fn dispatch(
        &self,
        stream: tokio::net::TcpStream,
        peer: SocketAddr,
        permit: Option<tokio::sync::OwnedSemaphorePermit>,
    ) {
        let handler = Arc::clone(&self.handler);

        tokio::spawn(async move {
            handler.handle(stream, &peer.to_string()).await;
            drop(permit);
        });
    }

    /// Stop accepting. Safe to call any number of times, before or during
    /// `serve`.
    pub fn stop(&self) {
        if !self.shutdown.send_replace(true) {
            info!("Stopping listener");
        } else {
            debug!("Listener already stopping");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }
}

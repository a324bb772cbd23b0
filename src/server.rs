//! TCP acceptor for the mock backend.
//!
//! Binds the configured endpoint and hands every accepted connection to a
//! pair of session workers. Bind failure is fatal; accept failures are
//! logged and the loop keeps going.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};

use crate::config::Config;
use crate::console::Event;
use crate::registry::Registry;
use crate::session;

/// Server instance
pub struct Server {
    config: Config,
    registry: Arc<Mutex<Registry>>,
    events: mpsc::Sender<Event>,
}

impl Server {
    /// Create a new server instance
    pub fn new(
        config: Config,
        registry: Arc<Mutex<Registry>>,
        events: mpsc::Sender<Event>,
    ) -> Self {
        Server {
            config,
            registry,
            events,
        }
    }

    /// Bind the listener and accept connections until the process exits.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.config.listen).await?;
        let addr = listener.local_addr()?;
        let _ = self.events.send(Event::Listening { addr }).await;
        self.accept_loop(listener).await
    }

    /// Accept connections on an already-bound listener.
    pub async fn accept_loop(
        &self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "New connection");
                    self.attach(stream, peer).await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// Register an accepted connection and start its session workers.
    async fn attach(&self, stream: TcpStream, peer: SocketAddr) {
        let (id, lines) = self.registry.lock().await.register(peer);
        let _ = self.events.send(Event::Accepted { id, peer }).await;
        session::spawn(
            stream,
            id,
            lines,
            self.config.buf_size,
            Arc::clone(&self.registry),
            self.events.clone(),
        );
    }
}

//! Connected-client registry and operator line routing.
//!
//! The operator's console is a single input stream shared by every
//! connection, so each typed line has to be routed to exactly one client.
//! The registry tracks connected clients and a *selected* client: the most
//! recently accepted connection, unless the operator picks another one with
//! `/use`. Lines are delivered over a bounded per-connection channel whose
//! receiving end is owned by that connection's writer task.

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::sync::{mpsc, Mutex};

/// Connection identifier, assigned on accept, starting at 1.
pub type ConnId = u64;

/// Depth of each connection's outbound line queue.
pub const LINE_QUEUE_DEPTH: usize = 32;

/// One connected client.
#[derive(Debug, Clone)]
struct ClientHandle {
    peer: SocketAddr,
    tx: mpsc::Sender<String>,
}

/// Registry of connected clients and the current input selection.
#[derive(Debug, Default)]
pub struct Registry {
    clients: HashMap<ConnId, ClientHandle>,
    selected: Option<ConnId>,
    next_id: ConnId,
}

/// Outcome of routing one operator line.
#[derive(Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Line queued on the selected client's outbound channel.
    Delivered(ConnId),
    /// No client connected.
    NoClient,
    /// The selected client's writer task is gone; its entry was removed.
    Gone(ConnId),
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly accepted connection and hand back the receiving end
    /// of its outbound line queue. The newcomer becomes the selected client.
    pub fn register(&mut self, peer: SocketAddr) -> (ConnId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(LINE_QUEUE_DEPTH);
        self.next_id += 1;
        let id = self.next_id;
        self.clients.insert(id, ClientHandle { peer, tx });
        self.selected = Some(id);
        (id, rx)
    }

    /// Remove a client. If it was the selected one, selection falls back to
    /// the most recently accepted client still connected.
    pub fn remove(&mut self, id: ConnId) {
        self.clients.remove(&id);
        if self.selected == Some(id) {
            self.selected = self.clients.keys().max().copied();
        }
    }

    /// Select the client that receives operator input. Returns `false` for
    /// an unknown id.
    pub fn select(&mut self, id: ConnId) -> bool {
        if self.clients.contains_key(&id) {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    /// Whether any client is connected, for testing
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Currently selected client, for testing
    #[cfg(test)]
    pub fn selected(&self) -> Option<ConnId> {
        self.selected
    }

    /// Sender for the selected client, if any.
    fn selected_sender(&self) -> Option<(ConnId, mpsc::Sender<String>)> {
        let id = self.selected?;
        let handle = self.clients.get(&id)?;
        Some((id, handle.tx.clone()))
    }

    /// Snapshot of connected clients ordered by id, with the selection flag.
    pub fn list(&self) -> Vec<(ConnId, SocketAddr, bool)> {
        let mut entries: Vec<_> = self
            .clients
            .iter()
            .map(|(&id, handle)| (id, handle.peer, Some(id) == self.selected))
            .collect();
        entries.sort_by_key(|entry| entry.0);
        entries
    }
}

/// Route one operator line to the selected client.
///
/// The lock is only held to look up the sender, never across the channel
/// send. A failed send means the writer task dropped its receiver, so the
/// stale entry is removed before reporting.
pub async fn route(registry: &Mutex<Registry>, line: String) -> RouteOutcome {
    let target = registry.lock().await.selected_sender();
    let Some((id, tx)) = target else {
        return RouteOutcome::NoClient;
    };
    if tx.send(line).await.is_ok() {
        RouteOutcome::Delivered(id)
    } else {
        registry.lock().await.remove(id);
        RouteOutcome::Gone(id)
    }
}

//! Operator console: stdin input routing and stdout reporting.
//!
//! Input is read line by line from stdin by a single task. Plain lines are
//! relayed verbatim to the selected client; `/`-prefixed lines are
//! directives (`/list`, `/use <id>`), with `//` escaping a literal leading
//! slash in outgoing data.
//!
//! Output goes through one printer task consuming a channel of [`Event`]s,
//! so banners and received data never interleave.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::registry::{self, ConnId, Registry, RouteOutcome};

/// Depth of the event queue feeding the printer task.
pub const EVENT_QUEUE_DEPTH: usize = 64;

/// Everything the server reports on the operator's console.
#[derive(Debug, PartialEq, Eq)]
pub enum Event {
    /// Listener is bound and accepting.
    Listening { addr: SocketAddr },
    /// A connection was accepted.
    Accepted { id: ConnId, peer: SocketAddr },
    /// A chunk of client data, decoded as text.
    Received { id: ConnId, text: String },
    /// A connection ended (orderly close or reset).
    Disconnected { id: ConnId },
    /// Console feedback (directive results, routing problems).
    Notice(String),
}

/// Print server events, one line each, until the channel closes.
pub async fn print_events(mut events: mpsc::Receiver<Event>) {
    while let Some(event) = events.recv().await {
        match event {
            Event::Listening { addr } => println!("[*] Listening on {addr}"),
            Event::Accepted { id, peer } => {
                println!("[*] Accepted connection from {peer} (client {id})")
            }
            Event::Received { text, .. } => println!("Received from client: {text}"),
            Event::Disconnected { .. } => println!("Client disconnected"),
            Event::Notice(text) => println!("{text}"),
        }
    }
}

/// One parsed line of operator input.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    /// Send this text to the selected client.
    Line(String),
    /// `/list`: show connected clients.
    List,
    /// `/use <id>`: select the client that receives input.
    Use(ConnId),
    /// Unrecognized directive.
    Unknown(String),
}

/// Parse one line of operator input.
pub fn parse_input(line: &str) -> Input {
    let Some(rest) = line.strip_prefix('/') else {
        return Input::Line(line.to_string());
    };
    if let Some(escaped) = rest.strip_prefix('/') {
        return Input::Line(format!("/{escaped}"));
    }
    let mut parts = rest.split_whitespace();
    match parts.next() {
        Some("list") => Input::List,
        Some("use") => match parts.next().and_then(|id| id.parse().ok()) {
            Some(id) => Input::Use(id),
            None => Input::Unknown(line.to_string()),
        },
        _ => Input::Unknown(line.to_string()),
    }
}

/// Read operator input until stdin closes.
///
/// The server keeps running after stdin is exhausted; only the relay
/// direction is disabled.
pub async fn read_input(registry: Arc<Mutex<Registry>>, events: mpsc::Sender<Event>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if handle_input(&registry, &events, line).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!("stdin closed, operator input disabled");
                break;
            }
            Err(e) => {
                debug!(error = %e, "stdin read failed");
                break;
            }
        }
    }
}

/// Apply one line of operator input. Errors only when the printer is gone.
async fn handle_input(
    registry: &Mutex<Registry>,
    events: &mpsc::Sender<Event>,
    line: String,
) -> Result<(), mpsc::error::SendError<Event>> {
    match parse_input(&line) {
        Input::Line(text) => match registry::route(registry, text).await {
            RouteOutcome::Delivered(id) => debug!(client = id, "operator line queued"),
            RouteOutcome::NoClient => {
                events
                    .send(Event::Notice("No client connected".to_string()))
                    .await?
            }
            RouteOutcome::Gone(id) => {
                events
                    .send(Event::Notice(format!("Client {id} is gone, line dropped")))
                    .await?
            }
        },
        Input::List => {
            let entries = registry.lock().await.list();
            if entries.is_empty() {
                events
                    .send(Event::Notice("No clients connected".to_string()))
                    .await?;
            }
            for (id, peer, selected) in entries {
                let marker = if selected { " (selected)" } else { "" };
                events
                    .send(Event::Notice(format!("  [{id}] {peer}{marker}")))
                    .await?;
            }
        }
        Input::Use(id) => {
            let known = registry.lock().await.select(id);
            let notice = if known {
                format!("Relaying input to client {id}")
            } else {
                format!("No such client: {id}")
            };
            events.send(Event::Notice(notice)).await?;
        }
        Input::Unknown(text) => {
            events
                .send(Event::Notice(format!("Unknown directive: {text}")))
                .await?;
        }
    }
    Ok(())
}

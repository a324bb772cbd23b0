//! mock-backend: an interactive mock TCP backend server
//!
//! Stands in for a real backend while a client application is developed:
//! - Accepts any number of TCP connections and prints whatever they send
//! - Relays operator-typed lines to the selected client
//! - `/list` and `/use <id>` console directives pick the target client
//! - Configuration via CLI arguments or environment variables

mod config;
mod console;
mod registry;
mod server;
mod session;

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use registry::Registry;
use server::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        buf_size = config.buf_size,
        "Starting mock-backend server"
    );

    let registry = Arc::new(Mutex::new(Registry::new()));
    let (events_tx, events_rx) = mpsc::channel(console::EVENT_QUEUE_DEPTH);

    tokio::spawn(console::print_events(events_rx));
    tokio::spawn(console::read_input(Arc::clone(&registry), events_tx.clone()));

    let server = Server::new(config, registry, events_tx);

    // Run until the acceptor fails or the operator interrupts. Ctrl-C exits
    // immediately with code 0; in-flight connections are dropped with the
    // runtime.
    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            println!("\n[*] Exiting...");
        }
    }

    Ok(())
}

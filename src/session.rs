//! Per-connection workers.
//!
//! Each accepted connection is split into two tasks: a reader that reports
//! everything the client sends, and a writer that relays operator lines
//! queued by the console. The reader ending (orderly close or reset)
//! removes the client from the registry, which drops the line queue's
//! sender and in turn ends the writer task. A writer failing on its own
//! leaves a dead queue behind; the next route attempt detects and removes
//! it.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::console::Event;
use crate::registry::{ConnId, Registry};

/// Spawn the reader and writer tasks for one accepted connection.
pub fn spawn(
    stream: TcpStream,
    id: ConnId,
    lines: mpsc::Receiver<String>,
    buf_size: usize,
    registry: Arc<Mutex<Registry>>,
    events: mpsc::Sender<Event>,
) {
    let (read_half, write_half) = stream.into_split();

    tokio::spawn(write_loop(id, write_half, lines));

    tokio::spawn(async move {
        read_loop(id, read_half, buf_size, events.clone()).await;
        registry.lock().await.remove(id);
        let _ = events.send(Event::Disconnected { id }).await;
    });
}

/// Receive chunks from the client until close or reset.
///
/// Reads up to `buf_size` bytes at a time and reports each chunk as a
/// `Received` event, decoded as UTF-8 with replacement for invalid bytes.
/// There is no reassembly: a message larger than one chunk shows up as
/// multiple events.
pub async fn read_loop<R>(id: ConnId, mut reader: R, buf_size: usize, events: mpsc::Sender<Event>)
where
    R: AsyncRead + Unpin,
{
    // Cleared every pass, so the buffer never grows and reads stay within
    // one chunk.
    let mut buf = BytesMut::with_capacity(buf_size);

    loop {
        buf.clear();
        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                debug!(client = id, "connection closed by client");
                break;
            }
            Ok(n) => {
                debug!(client = id, bytes = n, "received chunk");
                let text = String::from_utf8_lossy(&buf).into_owned();
                if events.send(Event::Received { id, text }).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(client = id, error = %e, "read failed");
                break;
            }
        }
    }
}

/// Relay queued operator lines to the client until the queue closes or a
/// write fails.
///
/// Lines are written verbatim, without a trailing newline.
pub async fn write_loop<W>(id: ConnId, mut writer: W, mut lines: mpsc::Receiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            debug!(client = id, error = %e, "write failed");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn read_loop_reports_received_text() {
        let (mut client, server_side) = tokio::io::duplex(64);
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let reader = tokio::spawn(read_loop(1, server_side, 1024, events_tx));

        assert_ok!(client.write_all(b"ping").await);
        assert_eq!(
            events_rx.recv().await,
            Some(Event::Received {
                id: 1,
                text: "ping".to_string()
            })
        );

        drop(client);
        assert_ok!(reader.await);
    }

    #[tokio::test]
    async fn read_loop_decodes_invalid_utf8_lossily() {
        let (mut client, server_side) = tokio::io::duplex(64);
        let (events_tx, mut events_rx) = mpsc::channel(8);
        tokio::spawn(read_loop(1, server_side, 1024, events_tx));

        assert_ok!(client.write_all(&[0xff, 0xfe]).await);
        match events_rx.recv().await {
            Some(Event::Received { text, .. }) => {
                assert_eq!(text, "\u{fffd}\u{fffd}");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_loop_ends_on_orderly_close_without_events() {
        let (client, server_side) = tokio::io::duplex(64);
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let reader = tokio::spawn(read_loop(1, server_side, 1024, events_tx));

        drop(client);
        assert_ok!(reader.await);
        // Sender was dropped with the loop; no Received events were emitted.
        assert_eq!(events_rx.recv().await, None);
    }

    #[tokio::test]
    async fn read_loop_caps_chunks_at_buf_size() {
        let (mut client, server_side) = tokio::io::duplex(256);
        let (events_tx, mut events_rx) = mpsc::channel(8);
        tokio::spawn(read_loop(1, server_side, 4, events_tx));

        assert_ok!(client.write_all(b"abcdefgh").await);
        match events_rx.recv().await {
            Some(Event::Received { text, .. }) => assert_eq!(text, "abcd"),
            other => panic!("unexpected event: {other:?}"),
        }
        match events_rx.recv().await {
            Some(Event::Received { text, .. }) => assert_eq!(text, "efgh"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn write_loop_sends_lines_verbatim() {
        let (server_side, mut client) = tokio::io::duplex(64);
        let (lines_tx, lines_rx) = mpsc::channel(8);
        let writer = tokio::spawn(write_loop(1, server_side, lines_rx));

        assert_ok!(lines_tx.send("hello".to_string()).await);
        let mut buf = [0u8; 16];
        let n = assert_ok!(client.read(&mut buf).await);
        assert_eq!(&buf[..n], b"hello");

        // Closing the queue ends the writer.
        drop(lines_tx);
        assert_ok!(writer.await);
    }

    #[tokio::test]
    async fn write_loop_ends_when_peer_is_gone() {
        let (server_side, client) = tokio::io::duplex(8);
        let (lines_tx, lines_rx) = mpsc::channel(8);
        let writer = tokio::spawn(write_loop(1, server_side, lines_rx));

        drop(client);
        // The first write after the peer vanishes fails and ends the task.
        let _ = lines_tx.send("hello".to_string()).await;
        let _ = lines_tx.send("again".to_string()).await;
        assert_ok!(writer.await);
    }
}

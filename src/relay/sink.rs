use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// The receiving side of a [`ResponseSink`] went away: the client disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("response stream closed by client")]
pub struct SinkClosed;

/// Write half of a streaming response body.
///
/// The channel holds a single chunk, so a slow client blocks the writer
/// instead of letting output pile up in memory.
#[derive(Debug)]
pub struct ResponseSink {
    tx: mpsc::Sender<String>,
}

impl ResponseSink {
    /// Create a sink and the body stream it feeds.
    pub fn channel() -> (Self, ReceiverStream<String>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, ReceiverStream::new(rx))
    }

    /// Send one line; a trailing newline is appended.
    pub async fn send_line(&self, line: &str) -> Result<(), SinkClosed> {
        let mut chunk = String::with_capacity(line.len() + 1);
        chunk.push_str(line);
        chunk.push('\n');
        self.tx.send(chunk).await.map_err(|_| SinkClosed)
    }

    /// Resolves once the body stream has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

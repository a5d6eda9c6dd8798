//! Relaying a command's output into a streaming HTTP response.
//!
//! [`StreamRelay::relay`] spawns the command, forwards each output line to a
//! [`ResponseSink`] as soon as it is read, and stops early when the client
//! goes away. Whatever the exit path, the process is terminated before
//! `relay` returns; if the relay future itself is dropped or panics, the
//! [`ManagedProcess`] drop guard terminates it instead.

pub mod sink;


pub use sink::{ResponseSink, SinkClosed};

use tracing::{debug, info, warn};

use crate::subprocess::{
    ManagedProcess, ProcessCommand, ProcessError, ProcessState, ProcessStreamer,
};

/// Why a relay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// The command closed its output.
    Completed,
    /// The client disconnected first.
    Disconnected,
    /// The command could not be started.
    SpawnFailed,
    /// Reading the command's output failed.
    ReadFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub end: RelayEnd,
    /// Output lines delivered to the client, diagnostics excluded.
    pub lines_relayed: usize,
    pub pid: Option<u32>,
    /// `None` when the command never started.
    pub final_state: Option<ProcessState>,
}

#[derive(Debug, Clone, Default)]
pub struct StreamRelay {
    streamer: ProcessStreamer,
}

impl StreamRelay {
    pub fn new(streamer: ProcessStreamer) -> Self {
        Self { streamer }
    }

    pub async fn relay(&self, command: &ProcessCommand, sink: ResponseSink) -> RelayOutcome {
        let mut process = match self.streamer.start(command) {
            Ok(process) => process,
            Err(e) => {
                warn!("Failed to start {}: {}", command.display(), e);
                // Failures surface in-band; the client already has a 200
                let _ = sink.send_line(&format!("Execution failed: {e}")).await;
                return RelayOutcome {
                    end: RelayEnd::SpawnFailed,
                    lines_relayed: 0,
                    pid: None,
                    final_state: None,
                };
            }
        };
        let pid = process.pid();
        info!(?pid, "Streaming output of {}", command.display());

        let (end, lines_relayed) = Self::pump(&mut process, &sink).await;
        if end == RelayEnd::Completed {
            self.report_exit(&mut process, &sink).await;
        }

        let final_state = process.terminate().await;
        drop(process);

        info!(
            ?pid,
            ?end,
            lines_relayed,
            state = ?final_state,
            "Stream finished: {}",
            command.display()
        );
        RelayOutcome {
            end,
            lines_relayed,
            pid,
            final_state: Some(final_state),
        }
    }

    /// Forward lines until end of output, a read error or client disconnect.
    async fn pump(process: &mut ManagedProcess, sink: &ResponseSink) -> (RelayEnd, usize) {
        let mut relayed = 0;
        loop {
            // Watch for disconnects while the command is quiet, not only on write
            let next = tokio::select! {
                biased;
                _ = sink.closed() => return (RelayEnd::Disconnected, relayed),
                next = process.next_line() => next,
            };

            match next {
                None => return (RelayEnd::Completed, relayed),
                Some(Ok(line)) => {
                    if sink.send_line(&line).await.is_err() {
                        debug!(relayed, "Client disconnected, stopping relay");
                        return (RelayEnd::Disconnected, relayed);
                    }
                    relayed += 1;
                }
                Some(Err(e)) => {
                    warn!("Failed to read output of {}: {}", process.command(), e);
                    let _ = sink.send_line(&format!("Failed to read output: {e}")).await;
                    return (RelayEnd::ReadFailed, relayed);
                }
            }
        }
    }

    /// After EOF, give the command the grace period to exit and report a
    /// failing status in-band.
    async fn report_exit(&self, process: &mut ManagedProcess, sink: &ResponseSink) {
        match process.wait_for_exit(self.streamer.grace_period()).await {
            Ok(ProcessState::Exited(status)) if !status.success() => {
                let _ = sink
                    .send_line(&format!("Execution failed: exit status {status}"))
                    .await;
            }
            Ok(_) => {}
            Err(ProcessError::Timeout(_)) => {
                debug!("{} closed its output but is still running", process.command());
            }
            Err(e) => warn!("Failed to wait for {}: {}", process.command(), e),
        }
    }
}

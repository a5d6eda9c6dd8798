//! Lifecycle of a single spawned command.

use futures::StreamExt;
use std::time::Duration;
use tokio::process::Child;

use super::error::ProcessError;
use super::runner::{ExitStatus, OutputLine, OutputStream};

/// Termination state of a [`ManagedProcess`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Exited on its own.
    Exited(ExitStatus),
    /// Stopped by [`ManagedProcess::terminate`].
    Killed,
}

impl ProcessState {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running)
    }
}

/// A spawned command plus its combined output.
///
/// The handle owns the child. [`terminate`](Self::terminate) is the normal
/// way to stop it; if the handle is dropped while the child is still running,
/// termination is started from `Drop` instead.
pub struct ManagedProcess {
    child: Option<Child>,
    pid: Option<u32>,
    output: OutputStream,
    state: ProcessState,
    grace_period: Duration,
    command: String,
}

impl ManagedProcess {
    pub(crate) fn new(
        child: Child,
        output: OutputStream,
        grace_period: Duration,
        command: String,
    ) -> Self {
        let pid = child.id();
        Self {
            child: Some(child),
            pid,
            output,
            state: ProcessState::Running,
            grace_period,
            command,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn state(&self) -> &ProcessState {
        &self.state
    }

    /// Next line of combined output, or `None` once both pipes are closed.
    pub async fn next_line(&mut self) -> Option<OutputLine> {
        self.output.next().await
    }

    /// Wait up to `timeout` for the process to exit on its own.
    ///
    /// Returns the state unchanged if the process was already reaped.
    pub async fn wait_for_exit(&mut self, timeout: Duration) -> Result<ProcessState, ProcessError> {
        let Some(child) = self.child.as_mut() else {
            return Ok(self.state.clone());
        };

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                self.state = ProcessState::Exited(ExitStatus::from_std(status));
                self.child = None;
                Ok(self.state.clone())
            }
            Ok(Err(e)) => Err(ProcessError::Io(e)),
            Err(_) => Err(ProcessError::Timeout(timeout)),
        }
    }

    /// Stop the process: SIGTERM to its group, then SIGKILL once the grace
    /// period runs out. Calling it again, or on a process that already
    /// exited, does nothing.
    pub async fn terminate(&mut self) -> ProcessState {
        let Some(mut child) = self.child.take() else {
            return self.state.clone();
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                self.state = ProcessState::Exited(ExitStatus::from_std(status));
                tracing::debug!(pid = ?self.pid, "Process already exited: {}", self.command);
                return self.state.clone();
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(pid = ?self.pid, "Failed to poll process status: {}", e),
        }

        terminate_child(child, self.pid, self.grace_period, &self.command).await;
        self.state = ProcessState::Killed;
        self.state.clone()
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }

        tracing::warn!(
            pid = ?self.pid,
            "Process handle dropped while running, terminating: {}",
            self.command
        );
        request_stop(&mut child, self.pid);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pid = self.pid;
                let grace_period = self.grace_period;
                let command = std::mem::take(&mut self.command);
                // If the runtime is shutting down the task never runs and
                // kill_on_drop takes over when the child is dropped with it.
                handle.spawn(async move {
                    terminate_child(child, pid, grace_period, &command).await;
                });
            }
            Err(_) => {
                #[cfg(unix)]
                signal_group(self.pid, nix::sys::signal::Signal::SIGKILL);
                if let Err(e) = child.start_kill() {
                    tracing::warn!(pid = ?self.pid, "Failed to kill process: {}", e);
                }
            }
        }
    }
}

/// Graceful stop with bounded escalation. Always reaps the child.
async fn terminate_child(mut child: Child, pid: Option<u32>, grace_period: Duration, command: &str) {
    request_stop(&mut child, pid);

    match tokio::time::timeout(grace_period, child.wait()).await {
        Ok(Ok(status)) => {
            tracing::debug!(?pid, "Process stopped ({}): {}", ExitStatus::from_std(status), command);
            return;
        }
        Ok(Err(e)) => {
            tracing::warn!(?pid, "Failed to wait for process after SIGTERM: {}", e);
        }
        Err(_) => {
            tracing::warn!(
                ?pid,
                "Process did not exit within {:?}, sending SIGKILL: {}",
                grace_period,
                command
            );
        }
    }

    #[cfg(unix)]
    signal_group(pid, nix::sys::signal::Signal::SIGKILL);

    if let Err(e) = child.kill().await {
        tracing::warn!(?pid, "Failed to kill process: {}", e);
    }
}

#[cfg(unix)]
fn request_stop(_child: &mut Child, pid: Option<u32>) {
    signal_group(pid, nix::sys::signal::Signal::SIGTERM);
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child, pid: Option<u32>) {
    if let Err(e) = child.start_kill() {
        tracing::warn!(?pid, "Failed to kill process: {}", e);
    }
}

/// Signal the whole process group led by `pid`.
#[cfg(unix)]
fn signal_group(pid: Option<u32>, sig: nix::sys::signal::Signal) {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return;
    };
    // Negative pid addresses the group
    let pgid = Pid::from_raw(-(pid as i32));
    if let Err(e) = kill(pgid, sig) {
        tracing::trace!(pid, "Sending {:?} to process group failed: {}", sig, e);
    }
}

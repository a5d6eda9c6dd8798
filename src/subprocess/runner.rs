use futures::stream::{self, Stream};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use super::error::ProcessError;
use super::process::ManagedProcess;

/// How long a process gets between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ProcessCommand {
    /// Program and arguments joined for logs and diagnostics.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub(crate) fn from_std(status: std::process::ExitStatus) -> Self {
        if status.success() {
            ExitStatus::Success
        } else if let Some(code) = status.code() {
            ExitStatus::Error(code)
        } else {
            Self::parse_signal_status(status)
        }
    }

    #[cfg(unix)]
    fn parse_signal_status(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;
        match status.signal() {
            Some(signal) => ExitStatus::Signal(signal),
            None => ExitStatus::Error(1),
        }
    }

    #[cfg(not(unix))]
    fn parse_signal_status(_status: std::process::ExitStatus) -> Self {
        ExitStatus::Error(1)
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitStatus::Success => write!(f, "0"),
            ExitStatus::Error(code) => write!(f, "{code}"),
            ExitStatus::Signal(signal) => write!(f, "signal {signal}"),
        }
    }
}

pub type OutputLine = Result<String, ProcessError>;
pub type OutputStream = Pin<Box<dyn Stream<Item = OutputLine> + Send>>;

/// Spawns commands whose combined stdout/stderr is consumed line by line.
#[derive(Debug, Clone)]
pub struct ProcessStreamer {
    grace_period: Duration,
}

impl Default for ProcessStreamer {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

impl ProcessStreamer {
    pub fn new(grace_period: Duration) -> Self {
        Self { grace_period }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Spawn `command` with both output pipes captured.
    ///
    /// Must be called from within a tokio runtime. The returned handle owns
    /// the child; dropping it while the child still runs terminates it.
    pub fn start(&self, command: &ProcessCommand) -> Result<ManagedProcess, ProcessError> {
        Self::log_command_start(command);

        let mut cmd = Self::configure_command(command);
        let mut child = cmd
            .spawn()
            .map_err(|e| Self::map_spawn_error(e, command))?;

        let stdout = child
            .stdout
            .take()
            .ok_or(ProcessError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(ProcessError::MissingPipe("stderr"))?;

        // Lines from either pipe are yielded as soon as they are read.
        let output: OutputStream = Box::pin(stream::select(
            Self::create_line_stream(BufReader::new(stdout)),
            Self::create_line_stream(BufReader::new(stderr)),
        ));

        let process = ManagedProcess::new(child, output, self.grace_period, command.display());
        tracing::debug!(
            pid = ?process.pid(),
            "Spawned subprocess: {}",
            process.command()
        );
        Ok(process)
    }

    fn configure_command(command: &ProcessCommand) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&command.program);

        // New process group so termination also reaches the command's children
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        cmd.args(&command.args);

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        // Last resort if the handle is dropped without a runtime to terminate it
        cmd.kill_on_drop(true);
        cmd
    }

    fn log_command_start(command: &ProcessCommand) {
        tracing::debug!("Executing subprocess: {}", command.display());
        tracing::trace!("Arguments: {:?}", command.args);
    }

    fn map_spawn_error(error: std::io::Error, command: &ProcessCommand) -> ProcessError {
        tracing::error!(
            "Failed to spawn '{}': {:?} (kind: {:?})",
            command.program,
            error,
            error.kind()
        );

        if error.kind() == std::io::ErrorKind::NotFound {
            ProcessError::CommandNotFound(command.program.clone())
        } else {
            ProcessError::SpawnFailed {
                command: command.display(),
                source: error,
            }
        }
    }

    /// Strip the line terminator, tolerating CRLF output.
    fn normalize_line(mut line: Vec<u8>) -> String {
        if line.ends_with(b"\n") {
            line.pop();
            if line.ends_with(b"\r") {
                line.pop();
            }
        }
        String::from_utf8_lossy(&line).into_owned()
    }

    /// Lazy line stream over one pipe. Ends at EOF or after the first read error.
    fn create_line_stream<R>(reader: BufReader<R>) -> OutputStream
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Box::pin(stream::unfold(Some(reader), |state| async move {
            let mut reader = state?;
            let mut line = Vec::new();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => None,
                Ok(_) => Some((Ok(Self::normalize_line(line)), Some(reader))),
                Err(e) => Some((Err(ProcessError::Read(e)), None)),
            }
        }))
    }
}

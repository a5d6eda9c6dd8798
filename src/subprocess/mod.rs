//! Spawning external commands and consuming their output as lines.
//!
//! A [`ProcessStreamer`] starts a [`ProcessCommand`] and hands back a
//! [`ManagedProcess`]: a lazy, non-restartable sequence of output lines plus
//! the means to stop the command (SIGTERM, then SIGKILL after a grace period).

pub mod builder;
pub mod error;
pub mod process;
pub mod runner;


pub use builder::ProcessCommandBuilder;
pub use error::ProcessError;
pub use process::{ManagedProcess, ProcessState};
pub use runner::{
    ExitStatus, OutputLine, OutputStream, ProcessCommand, ProcessStreamer, DEFAULT_GRACE_PERIOD,
};

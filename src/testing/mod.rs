//! Helpers shared by the unit tests.

use crate::subprocess::{ProcessCommand, ProcessCommandBuilder};

/// `sh -c <script>`
pub fn sh(script: &str) -> ProcessCommand {
    ProcessCommandBuilder::new("sh").arg("-c").arg(script).build()
}

/// Whether `pid` still names a live process. Zombies waiting for a
/// non-reaping init count as dead.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    if kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => !stat.contains(") Z "),
        Err(_) => true,
    }
}

/// Poll until `pid` is gone or `timeout` elapses.
#[cfg(unix)]
pub async fn wait_until_dead(pid: u32, timeout: std::time::Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while is_alive(pid) {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    true
}

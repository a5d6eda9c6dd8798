//! Runtime configuration, resolved once at startup.
//!
//! Values come from the command line first, then the settings file, then
//! built-in defaults. Nothing here is reloaded while the daemon runs.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;
use crate::settings::{SettingsError, SettingsStore};
use crate::subprocess::{ProcessCommand, ProcessCommandBuilder};


pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_UI_FILE: &str = "ui.html";
pub const DEFAULT_RELOAD_SCRIPT: &str = "./auto_task.sh";
pub const DEFAULT_LOG_UNIT: &str = "mihomo";
pub const DEFAULT_LOG_LINES: u32 = 1000;
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelConfig {
    pub env_file: PathBuf,
    pub bind: IpAddr,
    pub port: u16,
    pub ui_file: PathBuf,
    /// Command streamed by `GET /reload`.
    pub reload_command: ProcessCommand,
    /// Command streamed by `GET /logs`.
    pub logs_command: ProcessCommand,
    pub grace_period: Duration,
    pub local_only: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            ui_file: PathBuf::from(DEFAULT_UI_FILE),
            reload_command: reload_command(DEFAULT_RELOAD_SCRIPT),
            logs_command: logs_command(DEFAULT_LOG_UNIT, DEFAULT_LOG_LINES),
            grace_period: Duration::from_millis(DEFAULT_GRACE_PERIOD_MS),
            local_only: false,
        }
    }
}

impl PanelConfig {
    /// Combine command-line options with the settings file.
    pub async fn resolve(cli: &Cli, store: &SettingsStore) -> Result<Self, SettingsError> {
        let port = match cli.port {
            Some(port) => port,
            None => store.load_port().await?.unwrap_or(DEFAULT_PORT),
        };

        Ok(Self {
            env_file: cli.env_file.clone(),
            bind: cli.bind,
            port,
            ui_file: cli.ui.clone(),
            reload_command: reload_command(&cli.reload_script),
            logs_command: logs_command(&cli.log_unit, cli.log_lines),
            grace_period: Duration::from_millis(cli.grace_period_ms),
            local_only: cli.local_only,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// The task script, run without arguments.
pub fn reload_command(script: &str) -> ProcessCommand {
    ProcessCommandBuilder::new(script).build()
}

/// `journalctl -n <lines> -fu <unit>`: recent history, then follow.
pub fn logs_command(unit: &str, lines: u32) -> ProcessCommand {
    ProcessCommandBuilder::new("journalctl")
        .args(["-n", &lines.to_string(), "-fu", unit])
        .build()
}

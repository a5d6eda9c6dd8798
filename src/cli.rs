use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::config;

/// Control panel for a local mihomo install
#[derive(Debug, Clone, Parser)]
#[command(name = "mihomo-panel")]
#[command(about = "Serve the mihomo control panel: task and log streaming plus settings", long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Settings file (also supplies PORT and MIHOMO_SECRET)
    #[arg(long, default_value = config::DEFAULT_ENV_FILE)]
    pub env_file: PathBuf,

    /// Listening port; overrides PORT from the settings file
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// HTML page served at /
    #[arg(long, default_value = config::DEFAULT_UI_FILE)]
    pub ui: PathBuf,

    /// Script run by /reload
    #[arg(long, default_value = config::DEFAULT_RELOAD_SCRIPT)]
    pub reload_script: String,

    /// systemd unit followed by /logs
    #[arg(long, default_value = config::DEFAULT_LOG_UNIT)]
    pub log_unit: String,

    /// Historical journal lines sent before following
    #[arg(long, default_value_t = config::DEFAULT_LOG_LINES)]
    pub log_lines: u32,

    /// Time between SIGTERM and SIGKILL when stopping a command, in milliseconds
    #[arg(long, default_value_t = config::DEFAULT_GRACE_PERIOD_MS)]
    pub grace_period_ms: u64,

    /// Only accept loopback clients while no secret is configured
    #[arg(long)]
    pub local_only: bool,
}

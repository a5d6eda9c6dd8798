//! Common test utilities and helpers

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use mihomo_panel::auth::AuthGate;
use mihomo_panel::config::PanelConfig;
use mihomo_panel::server::{self, AppState};
use mihomo_panel::settings::SettingsStore;
use mihomo_panel::subprocess::{ProcessCommand, ProcessCommandBuilder};

/// A panel listening on an ephemeral loopback port, backed by a temp dir.
pub struct TestServer {
    pub addr: SocketAddr,
    pub dir: TempDir,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(secret: Option<&str>, tweak: impl FnOnce(&mut PanelConfig, &TempDir)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = PanelConfig {
            env_file: dir.path().join(".env"),
            ui_file: dir.path().join("ui.html"),
            grace_period: Duration::from_millis(300),
            ..PanelConfig::default()
        };
        tweak(&mut config, &dir);

        let store = Arc::new(SettingsStore::new(&config.env_file));
        let state = Arc::new(AppState::new(
            config,
            AuthGate::new(secret.map(str::to_string)),
            store,
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            server::serve(state, listener).await.unwrap();
        });

        Self { addr, dir, handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// `sh -c <script>`
pub fn sh(script: &str) -> ProcessCommand {
    ProcessCommandBuilder::new("sh").arg("-c").arg(script).build()
}

/// Poll until `path` holds a pid.
pub async fn read_pid(path: &std::path::Path) -> u32 {
    for _ in 0..200 {
        if let Ok(text) = std::fs::read_to_string(path) {
            if let Ok(pid) = text.trim().parse() {
                return pid;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no pid written to {}", path.display());
}

/// Zombies left for a non-reaping init count as dead.
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

pub async fn wait_until_dead(pid: u32, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while is_alive(pid) {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    true
}

use std::path::PathBuf;

use super::document::InvalidEntry;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings from {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write settings to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid setting: {0}")]
    InvalidEntry(#[from] InvalidEntry),

    #[error("Settings writer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::document::{self, SettingsDocument, PORT_KEY, SECRET_ALIAS, SECRET_KEY};
use super::error::SettingsError;

/// Settings persisted as a flat `key=value` file.
///
/// A missing file reads as an empty store. Writes replace the whole file
/// through a temporary file and a rename, and are serialized by a lock so
/// concurrent merges cannot interleave.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current document; empty if the file does not exist.
    pub async fn read_document(&self) -> Result<SettingsDocument, SettingsError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(SettingsDocument::new(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Settings file {} not found, using empty store", self.path.display());
                Ok(SettingsDocument::default())
            }
            Err(source) => Err(SettingsError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// All settings except the secret.
    pub async fn load_all(&self) -> Result<BTreeMap<String, String>, SettingsError> {
        Ok(self.read_document().await?.public_entries())
    }

    pub async fn load_secret(&self) -> Result<Option<String>, SettingsError> {
        Ok(self.read_document().await?.get(SECRET_KEY).map(str::to_string))
    }

    /// `PORT` if it is a plain decimal number that fits a port.
    pub async fn load_port(&self) -> Result<Option<u16>, SettingsError> {
        let document = self.read_document().await?;
        Ok(document.get(PORT_KEY).and_then(parse_port))
    }

    /// Apply `updates` to the stored document, in order, and write it back.
    ///
    /// Keys and values are trimmed. The secret alias is stored under the
    /// reserved key unless the reserved key is also present, which then
    /// wins. An empty value for the secret is skipped so a save cannot
    /// clear it.
    pub async fn merge<I, K, V>(&self, updates: I) -> Result<(), SettingsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let trimmed: Vec<(String, String)> = updates
            .into_iter()
            .map(|(key, value)| {
                (
                    key.as_ref().trim().to_string(),
                    value.as_ref().trim().to_string(),
                )
            })
            .collect();
        let has_reserved = trimmed.iter().any(|(key, _)| key == SECRET_KEY);

        let updates: Vec<(String, String)> = trimmed
            .into_iter()
            .filter(|(key, _)| !(has_reserved && key == SECRET_ALIAS))
            .map(|(key, value)| (document::canonical_key(&key).to_string(), value))
            .filter(|(key, value)| !(key == SECRET_KEY && value.is_empty()))
            .collect();

        for (key, value) in &updates {
            document::check_entry(key, value)?;
        }
        if updates.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;

        let mut document = self.read_document().await?;
        for (key, value) in &updates {
            document.set(key, value);
        }
        self.write_document(document).await?;

        info!(
            keys = ?updates.iter().map(|(key, _)| key.as_str()).collect::<Vec<_>>(),
            "Saved settings to {}",
            self.path.display()
        );
        Ok(())
    }

    async fn write_document(&self, document: SettingsDocument) -> Result<(), SettingsError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            write_atomic(&path, document.as_str()).map_err(|source| SettingsError::Write {
                path: path.clone(),
                source,
            })
        })
        .await?
    }
}

fn parse_port(value: &str) -> Option<u16> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Write to a temp file in the target directory, then rename over the target.
fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // NamedTempFile is created with mode 0600
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

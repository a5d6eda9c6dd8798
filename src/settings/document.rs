//! The flat `key=value` text format behind the settings store.
//!
//! Editing keeps everything it does not touch byte for byte: comments,
//! blank lines and line endings survive a rewrite.

use std::collections::BTreeMap;

/// Reserved key holding the shared secret.
pub const SECRET_KEY: &str = "MIHOMO_SECRET";

/// Request field that is stored under [`SECRET_KEY`].
pub const SECRET_ALIAS: &str = "secret";

/// Key holding the listening port.
pub const PORT_KEY: &str = "PORT";

/// Split a document line into key and value.
///
/// The line is trimmed and split at the first `=`. Blank lines, lines
/// without a separator and lines with an empty key yield `None`.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.trim().split_once('=')?;
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Map the secret alias onto the reserved key.
pub fn canonical_key(key: &str) -> &str {
    if key == SECRET_ALIAS {
        SECRET_KEY
    } else {
        key
    }
}

/// Why a key or value cannot be stored in the document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidEntry {
    #[error("setting key must not be empty")]
    EmptyKey,
    #[error("setting key `{0}` contains `=` or a line break")]
    Key(String),
    #[error("value of `{0}` contains a line break")]
    Value(String),
}

/// Reject entries the line format cannot represent.
pub fn check_entry(key: &str, value: &str) -> Result<(), InvalidEntry> {
    if key.trim().is_empty() {
        return Err(InvalidEntry::EmptyKey);
    }
    if key.contains(['=', '\n', '\r']) {
        return Err(InvalidEntry::Key(key.to_string()));
    }
    if value.contains(['\n', '\r']) {
        return Err(InvalidEntry::Value(key.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsDocument {
    text: String,
}

impl SettingsDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Well-formed entries in document order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.text.lines().filter_map(parse_line)
    }

    /// Value of `key`; the first occurrence wins, matching the line
    /// [`set`](Self::set) rewrites.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Every entry except the secret, first occurrence per key.
    pub fn public_entries(&self) -> BTreeMap<String, String> {
        let mut entries = BTreeMap::new();
        for (key, value) in self.entries().filter(|(key, _)| *key != SECRET_KEY) {
            entries
                .entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
        entries
    }

    /// Set `key` to `value`.
    ///
    /// The first line holding `key` is rewritten in place and any later
    /// duplicates are dropped. A new key is appended on its own line, with
    /// a newline inserted first if the document does not end in one.
    pub fn set(&mut self, key: &str, value: &str) {
        let replacement = format!("{key}={value}");
        let mut out = String::with_capacity(self.text.len() + replacement.len() + 2);
        let mut replaced = false;

        for line in self.text.split_inclusive('\n') {
            let (body, terminator) = split_terminator(line);
            if parse_line(body).is_some_and(|(k, _)| k == key) {
                if !replaced {
                    out.push_str(&replacement);
                    out.push_str(terminator);
                    replaced = true;
                }
                continue;
            }
            out.push_str(line);
        }

        if !replaced {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&replacement);
            out.push('\n');
        }

        self.text = out;
    }
}

fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

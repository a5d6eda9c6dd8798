//! Persistent key-value settings backed by a flat text file.

pub mod document;
pub mod error;
pub mod store;


pub use document::{
    check_entry, InvalidEntry, SettingsDocument, PORT_KEY, SECRET_ALIAS, SECRET_KEY,
};
pub use error::SettingsError;
pub use store::SettingsStore;

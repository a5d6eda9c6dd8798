//! # mihomo-panel
//!
//! A small control daemon for a local mihomo install. It serves one HTML
//! page, streams the output of the task script and of the service journal
//! to the browser line by line, and edits the flat `key=value` settings
//! file the task script reads.
//!
//! ## Modules
//!
//! - `subprocess` - Spawning commands with merged, line-oriented output and group termination
//! - `relay` - Forwarding process output into a streaming response, stopping on disconnect
//! - `settings` - The settings document and its atomically written store
//! - `auth` - Shared-secret check for settings changes
//! - `config` - Runtime configuration resolved at startup
//! - `server` - Router, handlers and shared state
//! - `error` - Request errors and their JSON rendering
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod relay;
pub mod server;
pub mod settings;
pub mod subprocess;

#[cfg(test)]
mod testing;

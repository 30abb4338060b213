// Alert scheduling core for remind
// Shared between the `remind` CLI and the `remind-daemon` binary

pub mod config;
pub mod daemon;
pub mod error;
pub mod notify;
pub mod ops;
pub mod reconciler;
pub mod record;
pub mod store;
pub mod timespec;

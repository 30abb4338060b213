// remind: personal alert scheduler
// The `remind` CLI edits the alert file; `remind-daemon` polls it and fires
// notifications when alerts come due.

// Alert model, store, reconciler and daemon loop (shared by both binaries)
pub mod alerts;

// Tracing subscriber setup
pub mod logging;

pub use alerts::config::Config;
pub use alerts::record::{AlertId, AlertMode, AlertRecord};
pub use alerts::store::AlertStore;

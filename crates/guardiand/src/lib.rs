//! Guardian daemon: receives pull request webhooks and runs the fix pipeline
//! for each one in the background.

pub mod config;
pub mod ingress;

pub use config::DaemonConfig;
pub use ingress::{router, AppState};

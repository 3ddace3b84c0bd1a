use thiserror::Error;

use ncunit::peer::PeerError;
use ncunit::state::StateError;
use ncunit::ConfigError;

/// Failures of the host binary itself, before or after reconciliation.
#[derive(Error, Debug)]
pub enum HookError {
    #[error("Failed to install logging: {0}")]
    Logging(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error("Invalid event JSON: {0}")]
    Event(#[source] serde_json::Error),

    #[error("Failed to encode output: {0}")]
    Output(#[source] serde_json::Error),

    #[error("Failed to write output: {0}")]
    Write(#[from] std::io::Error),
}

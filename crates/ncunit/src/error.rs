use std::path::PathBuf;
use thiserror::Error;

use crate::occ::CliError;
use crate::peer::PeerError;
use crate::render::RenderError;
use crate::secrets::SecretError;
use crate::state::StateError;
use crate::system::SystemError;

/// How an error (or a deferral) is handled by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// A precondition is not met yet. The event is deferred and redelivered.
    RecoverableWait,
    /// The application was not ready within the retry budget. Deferred.
    BoundedRetry,
    /// Malformed or incomplete input from a relation or the configuration.
    FatalValidation,
    /// A one-time, non-idempotent mutation failed.
    FatalOperation,
    /// Logged and reflected in status, never aborts.
    Soft,
}

impl ErrorClass {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorClass::FatalValidation | ErrorClass::FatalOperation)
    }
}

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("occ error: {0}")]
    Cli(#[from] CliError),

    #[error("System error: {0}")]
    System(#[from] SystemError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Peer store error: {0}")]
    Peer(#[from] PeerError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Nextcloud bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("Failed to fetch Nextcloud payload: {0}")]
    Fetch(String),
}

impl NodeError {
    /// Classifies the error for the host. Every `NodeError` that escapes a
    /// handler aborts the node; the class tells operators whether the input
    /// or the operation was at fault.
    pub fn class(&self) -> ErrorClass {
        match self {
            NodeError::Config(_) | NodeError::Validation(_) => ErrorClass::FatalValidation,
            _ => ErrorClass::FatalOperation,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Unsupported overwriteprotocol '{0}', expected http or https")]
    InvalidProtocol(String),

    #[error("Unsupported default-phone-region '{0}', expected an ISO 3166-1 alpha-2 code")]
    InvalidPhoneRegion(String),

    #[error("Invalid overwrite-cli-url '{0}': must start with http:// or https://")]
    InvalidCliUrl(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Database relation is missing required field '{0}'")]
    MissingDatabaseField(&'static str),

    #[error("Invalid database endpoint '{0}', expected host:port")]
    InvalidEndpoint(String),

    #[error("Invalid object storage credentials: {0}")]
    InvalidCephUser(String),

    #[error("Invalid action parameters for '{action}': {reason}")]
    InvalidActionParams { action: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove file '{path}': {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, NodeError>;

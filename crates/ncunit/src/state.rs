//! Durable per-node lifecycle flags.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::StorageError;
use crate::storage;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to access state file: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to parse state file '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What this node has achieved so far. Created all-false at first install,
/// mutated only by the reconciler, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleState {
    pub fetched: bool,
    pub database_available: bool,
    /// One-time bootstrap succeeded. Only `DatabaseRemoved` resets it.
    pub initialized: bool,
    pub apache_configured: bool,
    pub php_configured: bool,
    pub ceph_configured: bool,
    pub redis_configured: bool,
    pub config_drifted: bool,
    pub datadir: PathBuf,
    /// Connection details of the current database relation. The password
    /// is kept apart, in a root-only file.
    pub database: Option<DatabaseRecord>,
    /// Last canonical config.php this node published or accepted.
    pub observed_canonical: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRecord {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub name: String,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self {
            fetched: false,
            database_available: false,
            initialized: false,
            apache_configured: false,
            php_configured: false,
            ceph_configured: false,
            redis_configured: false,
            config_drifted: false,
            datadir: PathBuf::from("/var/www/nextcloud/data"),
            database: None,
            observed_canonical: None,
            updated_at: None,
        }
    }
}

impl LifecycleState {
    /// Fresh state whose data directory follows `datadir`.
    pub fn with_datadir(datadir: impl Into<PathBuf>) -> Self {
        Self {
            datadir: datadir.into(),
            ..Self::default()
        }
    }
}

/// JSON file holding one [`LifecycleState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the state, or `initial` if nothing was persisted yet.
    pub fn load_or(&self, initial: LifecycleState) -> Result<LifecycleState, StateError> {
        match storage::read_optional(&self.path)? {
            None => Ok(initial),
            Some(text) => serde_json::from_str(&text).map_err(|e| StateError::Parse {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }

    pub fn load(&self) -> Result<LifecycleState, StateError> {
        self.load_or(LifecycleState::default())
    }

    /// Persists `state`, stamping `updated_at`. The write is atomic.
    pub fn save(&self, state: &LifecycleState) -> Result<LifecycleState, StateError> {
        let mut stamped = state.clone();
        stamped.updated_at = Some(Utc::now());

        let json = serde_json::to_string_pretty(&stamped)?;
        storage::write_atomic(&self.path, &json)?;

        log::debug!("Saved lifecycle state to {}", self.path.display());
        Ok(stamped)
    }
}

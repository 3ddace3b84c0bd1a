//! The replicated peer data store shared by all units of the application.
//!
//! Two scopes exist: the application scope holds canonical keys that only the
//! leader writes, and each unit has its own scope for identity keys that only
//! that unit writes.

mod store;
mod view;

pub use store::PeerStore;
pub use view::PeerView;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::role::{RoleContext, UnitId};

/// Canonical config.php blob published by the leader.
pub const NEXTCLOUD_CONFIG: &str = "nextcloud_config";
/// Canonical object-storage config blob published by the leader.
pub const CEPH_CONFIG: &str = "ceph_config";
/// Per-unit address other units use to reach it.
pub const INGRESS_ADDRESS: &str = "ingress_address";

pub const CANONICAL_KEYS: &[&str] = &[NEXTCLOUD_CONFIG, CEPH_CONFIG];

pub type PeerData = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum PeerError {
    #[error("Only the leader may write canonical key '{key}'")]
    NotLeader { key: String },

    #[error("Canonical key '{key}' may not be written before initialization")]
    NotInitialized { key: String },

    #[error("Unit '{writer}' may not write keys of unit '{target}'")]
    ForeignUnit { writer: UnitId, target: UnitId },

    #[error("'{0}' is not a canonical key")]
    UnknownCanonicalKey(String),

    #[error("Failed to access peer store '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: crate::error::StorageError,
    },

    #[error("Failed to parse peer store '{path}': {message}")]
    Parse { path: PathBuf, message: String },
}

/// Read-only copy of the peer store taken when an event is delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSnapshot {
    #[serde(default)]
    pub app: PeerData,
    #[serde(default)]
    pub units: BTreeMap<UnitId, PeerData>,
}

impl PeerSnapshot {
    pub fn canonical(&self, key: &str) -> Option<&str> {
        self.app.get(key).map(String::as_str)
    }

    pub fn unit_value(&self, unit: &UnitId, key: &str) -> Option<&str> {
        self.units
            .get(unit)
            .and_then(|data| data.get(key))
            .map(String::as_str)
    }

    /// Builder used by tests and hosts to seed canonical data.
    pub fn with_canonical(mut self, key: &str, value: impl Into<String>) -> Self {
        self.app.insert(key.to_string(), value.into());
        self
    }

    /// Builder that registers a unit with its ingress address.
    pub fn with_unit(mut self, unit: impl Into<UnitId>, ingress_address: &str) -> Self {
        self.units.entry(unit.into()).or_default().insert(
            INGRESS_ADDRESS.to_string(),
            ingress_address.to_string(),
        );
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteScope {
    Canonical,
    Unit(UnitId),
}

/// One staged write, applied by the host after the event completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerWrite {
    pub scope: WriteScope,
    pub key: String,
    pub value: String,
}

/// Enforces who may write what: canonical keys only by an initialized
/// leader, unit keys only by the unit itself.
pub fn check_write(
    writer: &RoleContext,
    initialized: bool,
    write: &PeerWrite,
) -> Result<(), PeerError> {
    match &write.scope {
        WriteScope::Canonical => {
            if !CANONICAL_KEYS.contains(&write.key.as_str()) {
                return Err(PeerError::UnknownCanonicalKey(write.key.clone()));
            }
            if !writer.is_leader() {
                return Err(PeerError::NotLeader {
                    key: write.key.clone(),
                });
            }
            if !initialized {
                return Err(PeerError::NotInitialized {
                    key: write.key.clone(),
                });
            }
            Ok(())
        }
        WriteScope::Unit(target) if target != &writer.unit => Err(PeerError::ForeignUnit {
            writer: writer.unit.clone(),
            target: target.clone(),
        }),
        WriteScope::Unit(_) => Ok(()),
    }
}

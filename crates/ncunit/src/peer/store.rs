use std::path::Path;

use super::{check_write, PeerData, PeerError, PeerSnapshot, PeerWrite, WriteScope};
use crate::role::{RoleContext, UnitId};
use crate::storage;

/// A local replica of the peer relation, persisted as JSON.
///
/// The host keeps one of these per node: it applies membership changes as
/// units join and leave, and applies each event's staged writes after
/// checking them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerStore {
    snapshot: PeerSnapshot,
}

impl PeerStore {
    pub fn new(snapshot: PeerSnapshot) -> Self {
        Self { snapshot }
    }

    /// Loads the replica; a missing file is an empty relation.
    pub fn load(path: &Path) -> Result<Self, PeerError> {
        let content = storage::read_optional(path).map_err(|source| PeerError::Storage {
            path: path.to_path_buf(),
            source,
        })?;

        match content {
            None => Ok(Self::default()),
            Some(text) if text.trim().is_empty() => Ok(Self::default()),
            Some(text) => serde_json::from_str(&text)
                .map(Self::new)
                .map_err(|e| PeerError::Parse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), PeerError> {
        let json = serde_json::to_string_pretty(&self.snapshot).map_err(|e| PeerError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        storage::write_atomic(path, &json).map_err(|source| PeerError::Storage {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn snapshot(&self) -> &PeerSnapshot {
        &self.snapshot
    }

    pub fn join(&mut self, unit: &UnitId) {
        self.snapshot.units.entry(unit.clone()).or_default();
    }

    pub fn depart(&mut self, unit: &UnitId) {
        self.snapshot.units.remove(unit);
    }

    /// Records data another unit published on the relation. Existing keys
    /// are overwritten, keys absent from `data` are kept.
    pub fn merge_unit(&mut self, unit: &UnitId, data: &PeerData) {
        let entry = self.snapshot.units.entry(unit.clone()).or_default();
        entry.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Records the application bag as the host delivered it. Only the
    /// leader writes there, so the host's copy is authoritative.
    pub fn merge_app(&mut self, data: &PeerData) {
        self.snapshot
            .app
            .extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Relation broken: every entry goes.
    pub fn clear(&mut self) {
        self.snapshot = PeerSnapshot::default();
    }

    /// Applies staged writes in order. All writes are checked before any is
    /// applied, so a rejected batch leaves the replica untouched.
    pub fn apply(
        &mut self,
        writer: &RoleContext,
        initialized: bool,
        writes: &[PeerWrite],
    ) -> Result<(), PeerError> {
        for write in writes {
            check_write(writer, initialized, write)?;
        }

        for write in writes {
            let data = match &write.scope {
                WriteScope::Canonical => &mut self.snapshot.app,
                WriteScope::Unit(unit) => self.snapshot.units.entry(unit.clone()).or_default(),
            };
            data.insert(write.key.clone(), write.value.clone());
        }
        Ok(())
    }
}

use super::{
    check_write, PeerError, PeerSnapshot, PeerWrite, WriteScope, INGRESS_ADDRESS,
};
use crate::role::{RoleContext, UnitId};

/// A snapshot plus the writes staged during the current event.
///
/// Reads see staged writes first, so a handler that publishes and then
/// reads back observes its own publish.
#[derive(Debug)]
pub struct PeerView<'a> {
    snapshot: &'a PeerSnapshot,
    writes: Vec<PeerWrite>,
}

impl<'a> PeerView<'a> {
    pub fn new(snapshot: &'a PeerSnapshot) -> Self {
        Self {
            snapshot,
            writes: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> &PeerSnapshot {
        self.snapshot
    }

    pub fn canonical(&self, key: &str) -> Option<&str> {
        self.staged(&WriteScope::Canonical, key)
            .or_else(|| self.snapshot.canonical(key))
    }

    pub fn unit_value(&self, unit: &UnitId, key: &str) -> Option<&str> {
        self.staged(&WriteScope::Unit(unit.clone()), key)
            .or_else(|| self.snapshot.unit_value(unit, key))
    }

    fn staged(&self, scope: &WriteScope, key: &str) -> Option<&str> {
        self.writes
            .iter()
            .rev()
            .find(|w| &w.scope == scope && w.key == key)
            .map(|w| w.value.as_str())
    }

    /// Stages a canonical write. Rejected unless `writer` is the leader and
    /// the application is initialized.
    pub fn publish_canonical(
        &mut self,
        writer: &RoleContext,
        initialized: bool,
        key: &str,
        value: impl Into<String>,
    ) -> Result<(), PeerError> {
        let write = PeerWrite {
            scope: WriteScope::Canonical,
            key: key.to_string(),
            value: value.into(),
        };
        check_write(writer, initialized, &write)?;
        self.writes.push(write);
        Ok(())
    }

    /// Stages this unit's identity write if it is missing or stale.
    pub fn refresh_identity(&mut self, writer: &RoleContext) {
        if writer.ingress_address.is_empty()
            || self.unit_value(&writer.unit, INGRESS_ADDRESS) == Some(writer.ingress_address.as_str())
        {
            return;
        }
        self.writes.push(PeerWrite {
            scope: WriteScope::Unit(writer.unit.clone()),
            key: INGRESS_ADDRESS.to_string(),
            value: writer.ingress_address.clone(),
        });
    }

    /// Addresses of every other known unit followed by this unit's own,
    /// skipping `departed`.
    pub fn peer_addresses(&self, own: &RoleContext, departed: Option<&UnitId>) -> Vec<String> {
        let mut addresses: Vec<String> = self
            .snapshot
            .units
            .keys()
            .filter(|unit| *unit != &own.unit && Some(*unit) != departed)
            .filter_map(|unit| self.unit_value(unit, INGRESS_ADDRESS))
            .filter(|addr| !addr.is_empty())
            .map(str::to_string)
            .collect();

        if !own.ingress_address.is_empty() {
            addresses.push(own.ingress_address.clone());
        }
        addresses
    }

    pub fn writes(&self) -> &[PeerWrite] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<PeerWrite> {
        self.writes
    }
}

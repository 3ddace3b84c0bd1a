//! Peer relation handling: the leader keeps trusted domains in line with
//! cluster membership and publishes config.php, followers apply it.

use tracing::{info, info_span};

use crate::error::Result;
use crate::occ::RemoteConfigCli;
use crate::peer::{CEPH_CONFIG, NEXTCLOUD_CONFIG};
use crate::role::UnitId;

use super::context::{Cycle, Step};
use super::outcome::DeferReason;
use super::Reconciler;

/// Leading trusted-domain entries kept across pushes: localhost and the
/// FQDN slot.
const KEPT_DOMAINS: usize = 2;

impl Reconciler<'_> {
    pub(super) fn peer_joined(&self, cycle: &mut Cycle<'_>) -> Result<Step> {
        self.push_trusted_domains(cycle, None)?;
        self.publish_config(cycle)?;
        Ok(Step::Done)
    }

    pub(super) fn peer_departed(
        &self,
        cycle: &mut Cycle<'_>,
        departed: Option<&UnitId>,
    ) -> Result<Step> {
        if let Some(unit) = departed {
            info!(unit = %unit, "Peer departed");
        }
        self.push_trusted_domains(cycle, departed)?;
        self.publish_config(cycle)?;
        Ok(Step::Done)
    }

    pub(super) fn peer_changed(&self, cycle: &mut Cycle<'_>) -> Result<Step> {
        let Some(config) = cycle.peers.canonical(NEXTCLOUD_CONFIG).map(str::to_string) else {
            return Ok(Step::Defer(DeferReason::CanonicalConfigMissing));
        };
        let _step = info_span!("apply_canonical").entered();

        self.write_file(&self.layout.config_php, &config)?;
        self.touch(&cycle.state.datadir.join(".ocdata"))?;

        if let Some(ceph) = cycle.peers.canonical(CEPH_CONFIG).map(str::to_string) {
            self.write_file(&self.layout.ceph_config_php, &ceph)?;
            cycle.state.ceph_configured = true;
        }

        self.apply_ownership(cycle);

        // a unit running the leader's config.php is part of an initialized cluster
        cycle.state.initialized = true;
        cycle.state.observed_canonical = Some(config);
        info!("Applied the cluster's config.php");
        Ok(Step::Done)
    }

    /// Rewrites trusted domains as the kept leading entries followed by the
    /// address of every peer, re-indexed from 0.
    pub(super) fn push_trusted_domains(
        &self,
        cycle: &Cycle<'_>,
        departed: Option<&UnitId>,
    ) -> Result<()> {
        let _step = info_span!("push_trusted_domains").entered();

        let mut domains: Vec<String> = self
            .occ
            .trusted_domains()?
            .into_iter()
            .take(KEPT_DOMAINS)
            .collect();
        for address in cycle.peers.peer_addresses(cycle.role, departed) {
            if !domains.contains(&address) {
                domains.push(address);
            }
        }

        self.occ.delete_trusted_domains()?;
        for (index, domain) in domains.iter().enumerate() {
            self.occ.set_trusted_domain(domain, index)?;
        }

        info!(count = domains.len(), "Trusted domains updated");
        Ok(())
    }
}

use tracing::{debug, info, info_span};

use crate::error::{NodeError, Result};
use crate::occ::RemoteConfigCli;
use crate::render::{context, TemplateId};
use crate::retry::RetryPolicy;
use crate::status::DisplayStatus;
use crate::system::UnitSystem;

use super::context::{Cycle, Step};
use super::outcome::DeferReason;
use super::Reconciler;

/// Charm-style resource name of the bundled tarball.
pub const PAYLOAD_RESOURCE: &str = "nextcloud-tarfile";

const APACHE_SITE: &str = "nextcloud";
const PHP_MODULE: &str = "nextcloud";

impl Reconciler<'_> {
    pub(super) fn install(&self, cycle: &mut Cycle<'_>) -> Result<Step> {
        if cycle.state.fetched {
            debug!("Nextcloud already fetched");
            return Ok(Step::Done);
        }

        {
            let _step = info_span!("install_dependencies").entered();
            self.system
                .install_dependencies()
                .map_err(|e| NodeError::Fetch(format!("dependency installation failed: {}", e)))?;
        }

        {
            let _step = info_span!("fetch_payload").entered();
            let dest = self.layout.install_parent.clone();
            match self.system.fetch_resource(PAYLOAD_RESOURCE, dest.clone()) {
                Ok(_) => info!("Nextcloud extracted from the attached resource"),
                Err(resource_err) => {
                    info!("Resource unavailable ({}), downloading instead", resource_err);
                    self.system
                        .download_payload(&self.config.nextcloud_tarfile, dest)
                        .map_err(|e| {
                            NodeError::Fetch(format!("resource: {}; download: {}", resource_err, e))
                        })?;
                }
            }
        }

        self.apply_ownership(cycle);
        cycle.state.fetched = true;
        Ok(Step::Done)
    }

    pub(super) fn config_changed(&self, cycle: &mut Cycle<'_>) -> Result<Step> {
        self.configure_apache(cycle)?;
        self.configure_php(cycle)?;

        if cycle.role.is_leader() {
            if !cycle.state.initialized {
                cycle.status = Some(DisplayStatus::Blocked("blocked on database".to_string()));
                return Ok(Step::Defer(DeferReason::WaitingForDatabase));
            }
            self.apply_leader_settings(cycle);
            self.publish_config(cycle)?;
        }

        self.restart_service()?;
        self.configure_backup(cycle);
        Ok(Step::Done)
    }

    fn configure_apache(&self, cycle: &mut Cycle<'_>) -> Result<()> {
        let _step = info_span!("configure_apache").entered();
        let ctx = context([(
            "nextcloud_root",
            self.layout.nextcloud_root.display().to_string(),
        )]);
        self.render_to(TemplateId::ApacheSite, &ctx, &self.layout.apache_site)?;
        self.system.enable_apache_site(APACHE_SITE)?;
        cycle.state.apache_configured = true;
        Ok(())
    }

    fn configure_php(&self, cycle: &mut Cycle<'_>) -> Result<()> {
        let _step = info_span!("configure_php").entered();
        let php = &self.config.php;
        let ctx = context([
            ("max_file_uploads", php.max_file_uploads.to_string()),
            ("upload_max_filesize", php.upload_max_filesize.clone()),
            ("post_max_size", php.post_max_size.clone()),
            ("memory_limit", php.memory_limit.clone()),
        ]);

        let version = self.system.php_version()?;
        let path = self.layout.php_module(&version, PHP_MODULE);
        self.render_to(TemplateId::PhpModule, &ctx, &path)?;
        self.system.enable_php_module(PHP_MODULE)?;
        cycle.state.php_configured = true;
        Ok(())
    }

    /// Cluster-wide settings only the leader writes. Each one is cosmetic.
    fn apply_leader_settings(&self, cycle: &mut Cycle<'_>) {
        let _step = info_span!("leader_settings").entered();

        match self.config.overwrite_protocol() {
            Ok(protocol) => Self::cosmetic(
                cycle,
                "overwrite protocol",
                self.occ.set_overwrite_protocol(protocol),
            ),
            Err(e) => cycle.warn("overwrite protocol", e),
        }

        if !self.config.overwrite_cli_url.is_empty() {
            let result = self.occ.set_overwrite_cli_url(&self.config.overwrite_cli_url);
            Self::cosmetic(cycle, "overwrite cli url", result);
        }

        if !self.config.default_phone_region.is_empty() {
            let result = self
                .occ
                .set_default_phone_region(&self.config.default_phone_region);
            Self::cosmetic(cycle, "default phone region", result);
        }

        let result = self.occ.set_debug(self.config.debug);
        Self::cosmetic(cycle, "debug", result);
    }

    pub(super) fn start(&self, _cycle: &mut Cycle<'_>) -> Result<Step> {
        let policy = RetryPolicy::for_start(&self.config.controller);
        let installed = policy.poll("Nextcloud installation check", |attempt| {
            match self.occ.status() {
                Ok(status) => status.installed,
                Err(e) => {
                    debug!(attempt, "Status query failed: {}", e);
                    false
                }
            }
        });

        if !installed {
            return Ok(Step::Defer(DeferReason::ApplicationNotReady));
        }

        self.restart_service()?;
        self.system.open_port(self.config.controller.http_port)?;
        Ok(Step::Done)
    }

    pub(super) fn leader_elected(&self, cycle: &mut Cycle<'_>) -> Result<Step> {
        info!("This unit is now the leader");
        self.push_trusted_domains(cycle, None)?;
        self.publish_config(cycle)?;
        Ok(Step::Done)
    }
}

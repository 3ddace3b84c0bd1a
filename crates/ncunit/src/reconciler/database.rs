use tracing::{info, info_span};

use crate::error::{NodeError, Result};
use crate::event::{DatabaseEndpoint, DatabaseFields};
use crate::occ::{BootstrapRequest, RemoteConfigCli};
use crate::secrets::generate_password;
use crate::status::DisplayStatus;
use crate::system::UnitSystem;

use super::context::{Cycle, Step};
use super::outcome::LocalAction;
use super::{Reconciler, ADMIN_USER};

const CRON_SCHEDULE: &str = "*/5  *  *  *  *";

impl Reconciler<'_> {
    pub(super) fn database_created(
        &self,
        cycle: &mut Cycle<'_>,
        fields: &DatabaseFields,
    ) -> Result<Step> {
        let endpoint = fields.validate()?;
        self.database_vault.store(&endpoint.password)?;
        cycle.state.database_available = true;
        cycle.state.database = Some(endpoint.record());
        info!(host = %endpoint.address(), database = %endpoint.name, "Database available");

        if cycle.role.is_leader() && !cycle.state.initialized {
            self.bootstrap(cycle, &endpoint)?;
            cycle.state.initialized = true;
        }
        Ok(Step::Done)
    }

    /// One-time installation of Nextcloud against the database. Every step
    /// but the pretty URL setup is required. An application that is already
    /// installed is never installed again: a bootstrap that failed after
    /// `maintenance:install` resumes with the remaining steps.
    fn bootstrap(&self, cycle: &mut Cycle<'_>, endpoint: &DatabaseEndpoint) -> Result<()> {
        let _step = info_span!("bootstrap").entered();
        self.apply_ownership(cycle);

        let installed = self
            .occ
            .status()
            .map_err(|e| NodeError::Bootstrap(e.to_string()))?
            .installed;
        if installed {
            info!("Nextcloud already installed, finishing bootstrap");
        } else {
            self.install_application(cycle, endpoint)?;
        }

        if let Some(fqdn) = self.config.fqdn() {
            self.occ.set_trusted_domain(fqdn, 1)?;
        }
        if !cycle.role.ingress_address.is_empty() {
            self.occ.set_trusted_domain(&cycle.role.ingress_address, 2)?;
        }

        let rewrite = self.occ.set_rewrite_base();
        Self::cosmetic(cycle, "rewrite base", rewrite);
        let htaccess = self.occ.update_htaccess();
        Self::cosmetic(cycle, "update htaccess", htaccess);

        let cron_line = format!(
            "{} php -f {}",
            CRON_SCHEDULE,
            self.layout.nextcloud_root.join("cron.php").display()
        );
        self.system
            .install_crontab(&self.config.controller.web_user, &cron_line)?;
        self.occ.set_background_cron()?;

        let status = self
            .occ
            .status()
            .map_err(|e| NodeError::Bootstrap(e.to_string()))?;
        if !status.installed {
            return Err(NodeError::Bootstrap(
                "Nextcloud reports not installed after maintenance:install".to_string(),
            ));
        }

        info!("Nextcloud initialized");
        Ok(())
    }

    /// Runs `maintenance:install` with a fresh admin password. The password
    /// is kept only once the install went through.
    fn install_application(&self, cycle: &Cycle<'_>, endpoint: &DatabaseEndpoint) -> Result<()> {
        let password = generate_password();
        let request = BootstrapRequest {
            database: endpoint,
            admin_user: ADMIN_USER,
            admin_password: &password,
            data_dir: &cycle.state.datadir,
        };
        self.occ
            .bootstrap(&request)
            .map_err(|e| NodeError::Bootstrap(e.to_string()))?;

        self.vault.store(&password)?;
        self.journal.record(LocalAction::StoreCredential);
        Ok(())
    }

    pub(super) fn database_removed(&self, cycle: &mut Cycle<'_>) -> Step {
        info!("Database relation removed, waiting for a new one");
        cycle.state.database_available = false;
        cycle.state.initialized = false;
        cycle.state.database = None;
        if let Err(e) = self.database_vault.discard() {
            cycle.warn("database credential", e);
        }
        if let Err(e) = self.remove_file(&self.layout.backup_cron) {
            cycle.warn("backup", e);
        }
        cycle.status = Some(DisplayStatus::Waiting(
            "Waiting for database relation".to_string(),
        ));
        Step::Halt
    }
}

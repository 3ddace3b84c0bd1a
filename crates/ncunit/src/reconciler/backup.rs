use secrecy::ExposeSecret;
use tracing::{debug, info, info_span};

use crate::config::BackupSettings;
use crate::error::Result;
use crate::render::{context, shell_quote, TemplateId};
use crate::state::DatabaseRecord;
use crate::storage;

use super::context::Cycle;
use super::outcome::LocalAction;
use super::Reconciler;

const BACKUP_SCHEDULE: &str = "0 3 * * *";

impl Reconciler<'_> {
    /// Keeps the nightly backup job in line with the `backup-*` options.
    /// Backup trouble never fails the event; it is reported as a warning.
    pub(super) fn configure_backup(&self, cycle: &mut Cycle<'_>) {
        let _step = info_span!("configure_backup").entered();

        if self.config.backup.host().is_none() {
            if let Err(e) = self.remove_file(&self.layout.backup_cron) {
                cycle.warn("backup", e);
            }
            return;
        }
        if !cycle.state.initialized || !cycle.state.database_available {
            debug!("Node not ready, backup configuration postponed");
            return;
        }
        let Some(database) = cycle.state.database.clone() else {
            cycle.warn("backup", "database endpoint not recorded, rejoin the database relation");
            return;
        };

        match self.render_backup(cycle, &database) {
            Ok(true) => info!("Backup job configured"),
            Ok(false) => cycle.warn("backup", "database password not available"),
            Err(e) => cycle.warn("backup", e),
        }
    }

    /// Renders the script, its configuration and the cron entry. Returns
    /// `false` when the database password is missing.
    fn render_backup(&self, cycle: &Cycle<'_>, database: &DatabaseRecord) -> Result<bool> {
        let Some(password) = self.database_vault.read()? else {
            return Ok(false);
        };
        let backup = &self.config.backup;

        let conf = context([
            ("nextcloud_root", shell_quote(&self.layout.nextcloud_root.display().to_string())),
            ("data_dir", shell_quote(&cycle.state.datadir.display().to_string())),
            ("service", shell_quote(&self.config.controller.service)),
            ("web_user", shell_quote(&self.config.controller.web_user)),
            ("db_host", shell_quote(&database.host)),
            ("db_port", shell_quote(&database.port.to_string())),
            ("db_name", shell_quote(&database.name)),
            ("db_user", shell_quote(&database.user)),
            ("db_pass", shell_quote(password.expose_secret())),
        ]);
        let text = self.renderer.render(TemplateId::BackupConf, &conf)?;
        storage::write_private(&self.layout.backup_conf, &text)?;
        self.journal.record(LocalAction::WriteFile {
            path: self.layout.backup_conf.clone(),
        });

        let script = context([
            ("backup_host", shell_quote(backup.host.trim())),
            ("backup_port", shell_quote(&backup.port.to_string())),
            ("backup_user", shell_quote(&backup.user)),
            ("backup_conf", shell_quote(&self.layout.backup_conf.display().to_string())),
            ("slack_webhook", shell_quote(backup.slack_webhook.trim())),
            ("pagerduty_service_id", shell_quote(&pagerduty(backup, &backup.pagerduty_service_id))),
            ("pagerduty_token", shell_quote(&pagerduty(backup, &backup.pagerduty_token))),
            ("pagerduty_email", shell_quote(&pagerduty(backup, &backup.pagerduty_email))),
        ]);
        self.render_to(TemplateId::BackupScript, &script, &self.layout.backup_script)?;

        let cron = context([
            ("schedule", BACKUP_SCHEDULE.to_string()),
            ("backup_script", self.layout.backup_script.display().to_string()),
        ]);
        self.render_to(TemplateId::BackupCron, &cron, &self.layout.backup_cron)?;
        Ok(true)
    }
}

/// PagerDuty settings only reach the script when all of them are set.
fn pagerduty(backup: &BackupSettings, value: &str) -> String {
    if backup.pagerduty_enabled() {
        value.trim().to_string()
    } else {
        String::new()
    }
}

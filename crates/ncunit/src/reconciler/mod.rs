//! Event handling for one node.
//!
//! [`Reconciler::handle`] takes one event plus the node's persisted state,
//! role and a snapshot of the peer relation, and returns the new state, the
//! peer writes to publish and an [`Outcome`] for the host. It never
//! persists anything itself.

mod actions;
mod backup;
mod cluster;
mod context;
mod database;
mod integrations;
mod lifecycle;
mod outcome;
mod report;
mod route;
mod trace;
mod volumes;

use std::path::Path;

use tracing::{debug, error, info, info_span};

use crate::command::CommandOutput;
use crate::config::{Layout, UnitConfig};
use crate::error::{Result, StorageError};
use crate::event::Event;
use crate::occ::{CliError, RemoteConfigCli};
use crate::peer::{PeerSnapshot, CEPH_CONFIG, NEXTCLOUD_CONFIG};
use crate::render::{ConfigRenderer, RenderContext, TemplateId};
use crate::role::RoleContext;
use crate::secrets::CredentialVault;
use crate::state::LifecycleState;
use crate::status::{self, DisplayStatus};
use crate::system::{ServiceAction, UnitSystem};
use crate::{drift, storage};

use context::{Cycle, Step};
use trace::{Journal, TracedOcc, TracedSystem};

pub use actions::{NOT_AVAILABLE, ONLY_LEADER_MESSAGE};
pub use lifecycle::PAYLOAD_RESOURCE;
pub use outcome::{
    DeferReason, LocalAction, Outcome, Reconciled, Warning, EXIT_DEFERRED, EXIT_FATAL,
};
pub use report::{PeerWriteKey, Report, StateFlags};
pub use route::{route, Admission, Gate, OnMissing, Readiness, Route};

pub const ADMIN_USER: &str = "admin";

pub struct Reconciler<'a> {
    config: &'a UnitConfig,
    layout: &'a Layout,
    occ: TracedOcc<'a>,
    system: TracedSystem<'a>,
    renderer: &'a dyn ConfigRenderer,
    vault: CredentialVault,
    database_vault: CredentialVault,
    journal: Journal,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        config: &'a UnitConfig,
        layout: &'a Layout,
        occ: &'a dyn RemoteConfigCli,
        system: &'a dyn UnitSystem,
        renderer: &'a dyn ConfigRenderer,
    ) -> Self {
        let journal = Journal::default();
        Self {
            config,
            layout,
            occ: TracedOcc::new(occ, journal.clone()),
            system: TracedSystem::new(system, journal.clone()),
            renderer,
            vault: CredentialVault::new(&layout.credential_file),
            database_vault: CredentialVault::new(&layout.database_credential),
            journal,
        }
    }

    /// Handles one event. On a fatal error the returned state is `state`
    /// unchanged and no peer writes are returned.
    pub fn handle(
        &self,
        event: &Event,
        state: &LifecycleState,
        role: &RoleContext,
        peers: &PeerSnapshot,
    ) -> Reconciled {
        let _span = info_span!("reconcile",
            event = event.name(),
            role = %role.role,
            unit = %role.unit,
        )
        .entered();

        self.journal.clear();
        let mut cycle = Cycle::new(state.clone(), role, peers);

        if event.is_peer_event() {
            cycle.peers.refresh_identity(role);
        }

        let step = match route(event).admit(role.role, &cycle.state) {
            Admission::Run => self.dispatch(event, &mut cycle),
            Admission::Skip(reason) => {
                debug!(reason, "Nothing to do on this unit");
                Ok(Step::Done)
            }
            Admission::Defer(reason) => Ok(Step::Defer(reason)),
        };

        let outcome = match step {
            Ok(Step::Done) => Outcome::Applied,
            Ok(Step::Halt) => Outcome::Halted,
            Ok(Step::Defer(reason)) => {
                info!(%reason, "Deferring event");
                Outcome::Deferred(reason)
            }
            Err(e) => {
                error!(class = ?e.class(), "{} failed: {}", event, e);
                return Reconciled {
                    state: state.clone(),
                    actions: self.journal.drain(),
                    peer_writes: Vec::new(),
                    status: Some(DisplayStatus::Blocked(format!("{} failed: {}", event, e))),
                    outcome: Outcome::Fatal(e),
                    warnings: cycle.warnings,
                    workload_version: None,
                    action_result: cycle.action_result,
                };
            }
        };

        let (status, workload_version) = match event {
            Event::Action(_) => (None, None),
            _ => {
                let _step = info_span!("evaluate_status").entered();
                let (status, version) = self.evaluate_status(&mut cycle);
                (Some(status), version)
            }
        };

        let Cycle {
            state,
            peers,
            warnings,
            action_result,
            ..
        } = cycle;

        Reconciled {
            state,
            actions: self.journal.drain(),
            peer_writes: peers.into_writes(),
            outcome,
            status,
            warnings,
            workload_version,
            action_result,
        }
    }

    fn dispatch(&self, event: &Event, cycle: &mut Cycle<'_>) -> Result<Step> {
        match event {
            Event::Install => self.install(cycle),
            Event::ConfigChanged => self.config_changed(cycle),
            Event::Start => self.start(cycle),
            Event::UpdateStatus | Event::PeerBroken | Event::StorageDetaching => Ok(Step::Done),
            Event::LeaderElected => self.leader_elected(cycle),
            Event::DatabaseCreated(fields) => self.database_created(cycle, fields),
            Event::DatabaseRemoved => Ok(self.database_removed(cycle)),
            Event::PeerJoined { .. } => self.peer_joined(cycle),
            Event::PeerChanged { .. } => self.peer_changed(cycle),
            Event::PeerDeparted { unit } => self.peer_departed(cycle, unit.as_ref()),
            Event::ExternalStorageRelationChanged { fields } => self.ceph_changed(cycle, fields),
            Event::StorageAttached { location } => {
                info!(location = %location.display(), "Data storage attached");
                cycle.state.datadir = location.clone();
                Ok(Step::Done)
            }
            Event::ExternalMountRelationChanged { fields } => self.mount_changed(cycle, fields),
            Event::ExternalMountAvailable => Ok(self.mount_available(cycle)),
            Event::RedisRelationChanged { fields } => self.redis_changed(cycle, fields),
            Event::RedisRelationBroken => self.redis_broken(cycle),
            Event::ProxyJoined { address } => self.proxy_joined(cycle, address),
            Event::ProxyDeparted { remaining } => self.proxy_departed(cycle, remaining),
            Event::Action(request) => {
                let result = self.run_action(cycle, request);
                cycle.action_result = Some(result);
                Ok(Step::Done)
            }
        }
    }

    /// Applies an occ setting whose failure must not abort the event.
    pub(crate) fn cosmetic(
        cycle: &mut Cycle<'_>,
        step: &'static str,
        result: std::result::Result<CommandOutput, CliError>,
    ) {
        if cycle.soft(step, result).is_some() {
            debug!(step, "Setting applied");
        }
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        storage::write_file(path, content)?;
        self.journal.record(LocalAction::WriteFile {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        if storage::remove_if_exists(path)? {
            self.journal.record(LocalAction::RemoveFile {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    fn touch(&self, path: &Path) -> Result<()> {
        storage::touch(path)?;
        self.journal.record(LocalAction::WriteFile {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    fn render_to(&self, template: TemplateId, ctx: &RenderContext, path: &Path) -> Result<String> {
        let text = self.renderer.render(template, ctx)?;
        self.write_file(path, &text)?;
        debug!(template = %template, path = %path.display(), "Rendered");
        Ok(text)
    }

    /// Hands the installation and the data directory to the web user.
    fn apply_ownership(&self, cycle: &mut Cycle<'_>) {
        let mut paths = vec![self.layout.nextcloud_root.clone()];
        if !cycle.state.datadir.starts_with(&self.layout.nextcloud_root) {
            paths.push(cycle.state.datadir.clone());
        }
        let result = self.system.chown(paths, &self.config.controller.web_user);
        cycle.soft("ownership", result);
    }

    fn restart_service(&self) -> Result<()> {
        let _step = info_span!("restart_service").entered();
        self.system
            .service(ServiceAction::Restart, &self.config.controller.service)?;

        let settle = self.config.controller.settle_delay();
        if !settle.is_zero() {
            std::thread::sleep(settle);
        }
        Ok(())
    }

    /// Publishes this node's config.php (and ceph config, once configured)
    /// as the cluster's canonical configuration. Leader only.
    fn publish_config(&self, cycle: &mut Cycle<'_>) -> Result<()> {
        let _step = info_span!("publish_config").entered();
        let path = &self.layout.config_php;
        let content = std::fs::read_to_string(path).map_err(|source| StorageError::ReadFile {
            path: path.clone(),
            source,
        })?;

        cycle.peers.publish_canonical(
            cycle.role,
            cycle.state.initialized,
            NEXTCLOUD_CONFIG,
            content.clone(),
        )?;

        if cycle.state.ceph_configured {
            if let Some(ceph) = storage::read_optional(&self.layout.ceph_config_php)? {
                cycle.peers.publish_canonical(
                    cycle.role,
                    cycle.state.initialized,
                    CEPH_CONFIG,
                    ceph,
                )?;
            }
        }

        cycle.state.observed_canonical = Some(content);
        cycle.state.config_drifted = false;
        info!("Published config.php to the cluster");
        Ok(())
    }

    fn check_drift(&self, cycle: &mut Cycle<'_>) {
        let canonical = cycle
            .peers
            .canonical(NEXTCLOUD_CONFIG)
            .map(str::to_string)
            .or_else(|| cycle.state.observed_canonical.clone());
        if canonical.is_none() {
            return;
        }

        match storage::read_optional(&self.layout.config_php) {
            Ok(on_disk) => {
                let verdict = drift::detect(on_disk.as_deref(), canonical.as_deref());
                drift::apply(&mut cycle.state, verdict);
            }
            Err(e) => cycle.warn("drift check", e),
        }
    }

    /// Drift check plus status projection. Only asks occ for the version
    /// when everything else is in place.
    fn evaluate_status(&self, cycle: &mut Cycle<'_>) -> (DisplayStatus, Option<String>) {
        self.check_drift(cycle);

        if let Some(status) = cycle.status.take() {
            return (status, None);
        }

        let projected = status::project(&cycle.state, None);
        if !matches!(projected, DisplayStatus::Active(_)) {
            return (projected, None);
        }

        let version = match self.occ.status() {
            Ok(app) => app.version,
            Err(e) => {
                cycle.warn("version", e);
                None
            }
        };

        let displayed = status::project(&cycle.state, version.as_deref());
        let workload_version = version.filter(|_| cycle.role.is_leader());
        (displayed, workload_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerSettings;
    use crate::error::ErrorClass;
    use crate::event::{ActionRequest, DatabaseFields, RelationFields};
    use crate::peer::{WriteScope, INGRESS_ADDRESS};
    use crate::render::TemplateEngine;
    use crate::role::Role;
    use crate::stub::{RecordingSystem, StubOcc};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        config: UnitConfig,
        layout: Layout,
        occ: StubOcc,
        system: RecordingSystem,
        renderer: TemplateEngine,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let layout = Layout::rooted(dir.path());
            let config = UnitConfig {
                fqdn: "cloud.example.com".to_string(),
                controller: ControllerSettings::immediate(),
                ..UnitConfig::default()
            };
            Self {
                _dir: dir,
                config,
                layout,
                occ: StubOcc::new(),
                system: RecordingSystem::new(),
                renderer: TemplateEngine::new(),
            }
        }

        fn reconciler(&self) -> Reconciler<'_> {
            Reconciler::new(&self.config, &self.layout, &self.occ, &self.system, &self.renderer)
        }

        fn state(&self) -> LifecycleState {
            LifecycleState::with_datadir(&self.layout.default_datadir)
        }

        fn ready_state(&self) -> LifecycleState {
            LifecycleState {
                fetched: true,
                database_available: true,
                initialized: true,
                apache_configured: true,
                php_configured: true,
                ..self.state()
            }
        }

        fn write_config_php(&self, content: &str) {
            storage::write_file(&self.layout.config_php, content).unwrap();
        }
    }

    fn leader() -> RoleContext {
        RoleContext::new(Role::Leader, "nextcloud/0", "10.0.0.10")
    }

    fn follower() -> RoleContext {
        RoleContext::new(Role::Follower, "nextcloud/1", "10.0.0.11")
    }

    fn database_fields() -> DatabaseFields {
        DatabaseFields {
            host: "10.0.0.5".to_string(),
            port: "5432".to_string(),
            user: "nextcloud".to_string(),
            password: "dbsecret".to_string(),
            name: "nextcloud".to_string(),
            version: "14".to_string(),
        }
    }

    fn canonical_writes(reconciled: &Reconciled) -> Vec<&str> {
        reconciled
            .peer_writes
            .iter()
            .filter(|w| w.scope == WriteScope::Canonical)
            .map(|w| w.key.as_str())
            .collect()
    }

    #[test]
    fn test_install_fetches_once() {
        let fx = Fixture::new();
        let r = fx.reconciler();

        let first = r.handle(&Event::Install, &fx.state(), &leader(), &PeerSnapshot::default());
        assert!(matches!(first.outcome, Outcome::Applied));
        assert!(first.state.fetched);
        assert!(fx.system.ran("resource-get nextcloud-tarfile"));
        assert!(!fx.system.ran("download"));

        fx.system.reset_calls();
        let second = r.handle(&Event::Install, &first.state, &leader(), &PeerSnapshot::default());
        assert!(matches!(second.outcome, Outcome::Applied));
        assert!(!fx.system.ran("apt install"));
        assert!(!fx.system.ran("resource-get"));
    }

    #[test]
    fn test_install_falls_back_to_download() {
        let fx = Fixture::new();
        fx.system.fail_on("resource-get");

        let out = fx
            .reconciler()
            .handle(&Event::Install, &fx.state(), &leader(), &PeerSnapshot::default());
        assert!(matches!(out.outcome, Outcome::Applied));
        assert!(out.state.fetched);
        assert!(fx.system.ran("download"));
        assert!(fx.system.ran("chown -R www-data:www-data"));
    }

    #[test]
    fn test_install_fails_when_both_sources_fail() {
        let fx = Fixture::new();
        fx.system.fail_on("resource-get");
        fx.system.fail_on("download");

        let out = fx
            .reconciler()
            .handle(&Event::Install, &fx.state(), &leader(), &PeerSnapshot::default());
        assert!(out.outcome.is_fatal());
        assert!(!out.state.fetched);
        assert_eq!(out.outcome.exit_code(), EXIT_FATAL);
    }

    #[test]
    fn test_config_changed_leader_defers_before_initialization() {
        let fx = Fixture::new();
        let state = LifecycleState {
            fetched: true,
            ..fx.state()
        };

        let out = fx
            .reconciler()
            .handle(&Event::ConfigChanged, &state, &leader(), &PeerSnapshot::default());

        assert!(matches!(
            out.outcome,
            Outcome::Deferred(DeferReason::WaitingForDatabase)
        ));
        assert_eq!(
            out.status,
            Some(DisplayStatus::Blocked("blocked on database".to_string()))
        );
        assert!(out.state.apache_configured);
        assert!(out.state.php_configured);
        assert!(fx.layout.apache_site.exists());
        assert!(fx.layout.php_module("8.1", "nextcloud").exists());
        assert!(!fx.system.ran("systemctl restart"));
        assert_eq!(fx.occ.count("config:system:set"), 0);
    }

    #[test]
    fn test_config_changed_leader_publishes_canonical() {
        let fx = Fixture::new();
        fx.occ.set_installed(true);
        fx.write_config_php("<?php $CONFIG = array();");
        let state = LifecycleState {
            config_drifted: true,
            ..fx.ready_state()
        };

        let out = fx
            .reconciler()
            .handle(&Event::ConfigChanged, &state, &leader(), &PeerSnapshot::default());

        assert!(matches!(out.outcome, Outcome::Applied));
        assert_eq!(canonical_writes(&out), vec![NEXTCLOUD_CONFIG]);
        assert!(!out.state.config_drifted);
        assert_eq!(
            out.state.observed_canonical.as_deref(),
            Some("<?php $CONFIG = array();")
        );
        assert!(fx.occ.ran("config:system:set overwriteprotocol --value=http"));
        assert!(fx.occ.ran("config:system:set debug --type=boolean --value=false"));
        assert!(fx.system.ran("systemctl restart apache2"));
        assert_eq!(out.status, Some(DisplayStatus::Active("27.1.3".to_string())));
        assert_eq!(out.workload_version.as_deref(), Some("27.1.3"));
    }

    #[test]
    fn test_config_changed_cosmetic_failure_is_a_warning() {
        let fx = Fixture::new();
        fx.occ.set_installed(true);
        fx.occ.fail_on("config:system:set debug");
        fx.write_config_php("<?php");

        let out = fx
            .reconciler()
            .handle(&Event::ConfigChanged, &fx.ready_state(), &leader(), &PeerSnapshot::default());

        assert!(matches!(out.outcome, Outcome::Applied));
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].step, "debug");
        assert!(fx.system.ran("systemctl restart"));
    }

    #[test]
    fn test_config_changed_follower_does_not_publish() {
        let fx = Fixture::new();
        let out = fx.reconciler().handle(
            &Event::ConfigChanged,
            &fx.state(),
            &follower(),
            &PeerSnapshot::default(),
        );

        assert!(matches!(out.outcome, Outcome::Applied));
        assert!(canonical_writes(&out).is_empty());
        assert!(fx.system.ran("systemctl restart"));
        assert_eq!(fx.occ.count("config:system:set"), 0);
    }

    #[test]
    fn test_start_defers_after_three_attempts_without_restart() {
        let fx = Fixture::new();
        let out = fx
            .reconciler()
            .handle(&Event::Start, &fx.state(), &leader(), &PeerSnapshot::default());

        assert!(matches!(
            out.outcome,
            Outcome::Deferred(DeferReason::ApplicationNotReady)
        ));
        assert_eq!(out.outcome.class(), Some(ErrorClass::BoundedRetry));
        assert_eq!(fx.occ.count("status"), 3);
        assert!(!fx.system.ran("systemctl restart"));
        assert!(!fx.system.ran("open-port"));
    }

    #[test]
    fn test_start_counts_status_errors_as_attempts() {
        let fx = Fixture::new();
        fx.occ.set_installed(true);
        fx.occ.script_status([CommandOutput::failed(1, "boom")]);

        let out = fx
            .reconciler()
            .handle(&Event::Start, &fx.state(), &leader(), &PeerSnapshot::default());

        assert!(matches!(out.outcome, Outcome::Applied));
        assert!(fx.system.ran("systemctl restart apache2"));
        assert!(fx.system.ran("open-port 80/tcp"));
    }

    #[test]
    fn test_database_created_bootstraps_leader_once() {
        let fx = Fixture::new();
        let r = fx.reconciler();
        let state = LifecycleState {
            fetched: true,
            ..fx.state()
        };
        let event = Event::DatabaseCreated(database_fields());

        let out = r.handle(&event, &state, &leader(), &PeerSnapshot::default());
        assert!(matches!(out.outcome, Outcome::Applied));
        assert!(out.state.database_available);
        assert!(out.state.initialized);
        assert!(canonical_writes(&out).is_empty());
        assert_eq!(fx.occ.count("maintenance:install"), 1);
        assert_eq!(
            fx.occ.trusted_domain_list(),
            vec!["localhost", "cloud.example.com", "10.0.0.10"]
        );
        assert!(fx.occ.ran("background:cron"));
        assert!(fx.system.ran("crontab -u www-data"));
        assert!(out.actions.contains(&LocalAction::StoreCredential));

        let bootstrap = fx
            .occ
            .calls()
            .into_iter()
            .find(|c| c.starts_with("maintenance:install"))
            .unwrap();
        assert!(!bootstrap.contains("dbsecret"));

        let again = r.handle(&event, &out.state, &leader(), &PeerSnapshot::default());
        assert!(matches!(again.outcome, Outcome::Applied));
        assert_eq!(fx.occ.count("maintenance:install"), 1);
    }

    #[test]
    fn test_database_created_with_empty_field_is_fatal() {
        let fx = Fixture::new();
        let state = fx.state();
        let event = Event::DatabaseCreated(DatabaseFields {
            user: String::new(),
            ..database_fields()
        });

        let out = fx
            .reconciler()
            .handle(&event, &state, &leader(), &PeerSnapshot::default());

        assert_eq!(out.outcome.class(), Some(ErrorClass::FatalValidation));
        assert_eq!(out.state, state);
        assert!(fx.occ.calls().is_empty());
    }

    #[test]
    fn test_database_created_follower_only_sets_flag() {
        let fx = Fixture::new();
        let out = fx.reconciler().handle(
            &Event::DatabaseCreated(database_fields()),
            &fx.state(),
            &follower(),
            &PeerSnapshot::default(),
        );
        assert!(out.state.database_available);
        assert!(!out.state.initialized);
        assert!(!fx.occ.ran("maintenance:install"));
    }

    #[test]
    fn test_bootstrap_failure_keeps_state() {
        let fx = Fixture::new();
        fx.occ.fail_on("maintenance:install");
        let state = fx.state();

        let out = fx.reconciler().handle(
            &Event::DatabaseCreated(database_fields()),
            &state,
            &leader(),
            &PeerSnapshot::default(),
        );

        assert_eq!(out.outcome.class(), Some(ErrorClass::FatalOperation));
        assert_eq!(out.state, state);
        assert!(out.peer_writes.is_empty());
    }

    #[test]
    fn test_database_removed_halts() {
        let fx = Fixture::new();
        let out = fx.reconciler().handle(
            &Event::DatabaseRemoved,
            &fx.ready_state(),
            &leader(),
            &PeerSnapshot::default(),
        );
        assert!(matches!(out.outcome, Outcome::Halted));
        assert_eq!(out.outcome.exit_code(), 0);
        assert!(!out.state.database_available);
        assert!(!out.state.initialized);
        assert_eq!(
            out.status,
            Some(DisplayStatus::Waiting("Waiting for database relation".to_string()))
        );
    }

    #[test]
    fn test_follower_peer_changed_defers_without_canonical() {
        let fx = Fixture::new();
        let out = fx.reconciler().handle(
            &Event::PeerChanged {
                unit: None,
                data: RelationFields::new(),
                app: RelationFields::new(),
            },
            &fx.state(),
            &follower(),
            &PeerSnapshot::default(),
        );

        assert!(matches!(
            out.outcome,
            Outcome::Deferred(DeferReason::CanonicalConfigMissing)
        ));
        assert!(!fx.layout.config_php.exists());
        // identity is still published
        assert_eq!(out.peer_writes.len(), 1);
        assert_eq!(out.peer_writes[0].key, INGRESS_ADDRESS);
    }

    #[test]
    fn test_follower_peer_changed_applies_canonical() {
        let fx = Fixture::new();
        let snapshot = PeerSnapshot::default()
            .with_canonical(NEXTCLOUD_CONFIG, "<?php leader")
            .with_canonical(CEPH_CONFIG, "<?php ceph")
            .with_unit("nextcloud/1", "10.0.0.11");

        let out = fx.reconciler().handle(
            &Event::PeerChanged {
                unit: Some("nextcloud/0".into()),
                data: RelationFields::new(),
                app: RelationFields::new(),
            },
            &fx.state(),
            &follower(),
            &snapshot,
        );

        assert!(matches!(out.outcome, Outcome::Applied));
        assert_eq!(
            std::fs::read_to_string(&fx.layout.config_php).unwrap(),
            "<?php leader"
        );
        assert!(fx.layout.ceph_config_php.exists());
        assert!(fx.layout.default_datadir.join(".ocdata").exists());
        assert!(out.state.ceph_configured);
        assert!(out.state.initialized);
        assert!(!out.state.config_drifted);
        assert_eq!(out.state.observed_canonical.as_deref(), Some("<?php leader"));
        assert!(out.peer_writes.is_empty());
    }

    #[test]
    fn test_peer_joined_pushes_trusted_domains() {
        let fx = Fixture::new();
        fx.occ.set_installed(true);
        fx.occ
            .set_trusted_domains(&["localhost", "cloud.example.com", "10.0.0.10", "10.0.0.99"]);
        fx.write_config_php("<?php");
        let snapshot = PeerSnapshot::default()
            .with_unit("nextcloud/0", "10.0.0.10")
            .with_unit("nextcloud/1", "10.0.0.11");

        let out = fx.reconciler().handle(
            &Event::PeerJoined {
                unit: Some("nextcloud/1".into()),
            },
            &fx.ready_state(),
            &leader(),
            &snapshot,
        );

        assert!(matches!(out.outcome, Outcome::Applied));
        assert_eq!(
            fx.occ.trusted_domain_list(),
            vec!["localhost", "cloud.example.com", "10.0.0.11", "10.0.0.10"]
        );
        assert_eq!(canonical_writes(&out), vec![NEXTCLOUD_CONFIG]);
    }

    #[test]
    fn test_peer_departed_skipped_before_initialization() {
        let fx = Fixture::new();
        let out = fx.reconciler().handle(
            &Event::PeerDeparted { unit: None },
            &fx.state(),
            &leader(),
            &PeerSnapshot::default(),
        );
        assert!(matches!(out.outcome, Outcome::Applied));
        assert!(fx.occ.calls().is_empty());
    }

    #[test]
    fn test_drift_detected_on_update_status() {
        let fx = Fixture::new();
        fx.occ.set_installed(true);
        fx.write_config_php("<?php edited by hand");
        let state = LifecycleState {
            observed_canonical: Some("<?php canonical".to_string()),
            ..fx.ready_state()
        };

        let out = fx
            .reconciler()
            .handle(&Event::UpdateStatus, &state, &follower(), &PeerSnapshot::default());

        assert!(out.state.config_drifted);
        assert_eq!(
            out.status,
            Some(DisplayStatus::Waiting("Local changes to config.php".to_string()))
        );
        assert!(out.workload_version.is_none());
    }

    #[test]
    fn test_update_status_without_canonical_leaves_drift_flag() {
        let fx = Fixture::new();
        fx.occ.set_installed(true);
        let state = LifecycleState {
            config_drifted: true,
            ..fx.ready_state()
        };

        let out = fx
            .reconciler()
            .handle(&Event::UpdateStatus, &state, &leader(), &PeerSnapshot::default());
        assert!(out.state.config_drifted);
    }

    #[test]
    fn test_version_failure_is_soft() {
        let fx = Fixture::new();
        fx.occ.fail_on("status");

        let out = fx.reconciler().handle(
            &Event::UpdateStatus,
            &fx.ready_state(),
            &leader(),
            &PeerSnapshot::default(),
        );
        assert!(matches!(out.outcome, Outcome::Applied));
        assert_eq!(
            out.status,
            Some(DisplayStatus::Active(status::UNKNOWN_VERSION.to_string()))
        );
        assert!(out.workload_version.is_none());
        assert_eq!(out.warnings[0].step, "version");
    }

    #[test]
    fn test_actions_journal_is_per_event() {
        let fx = Fixture::new();
        let r = fx.reconciler();
        let first = r.handle(&Event::Install, &fx.state(), &leader(), &PeerSnapshot::default());
        assert!(!first.actions.is_empty());

        let second = r.handle(
            &Event::StorageDetaching,
            &first.state,
            &leader(),
            &PeerSnapshot::default(),
        );
        assert!(second.actions.is_empty());
    }

    #[test]
    fn test_admin_password_action_is_single_use() {
        let fx = Fixture::new();
        let r = fx.reconciler();
        let boot = r.handle(
            &Event::DatabaseCreated(database_fields()),
            &LifecycleState {
                fetched: true,
                ..fx.state()
            },
            &leader(),
            &PeerSnapshot::default(),
        );
        assert!(boot.state.initialized);

        let action = Event::Action(ActionRequest::new("get_admin_password"));
        let first = r.handle(&action, &boot.state, &leader(), &PeerSnapshot::default());
        let password = first.action_result.unwrap()["initial-admin-password"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(password.len() >= crate::secrets::MIN_PASSWORD_LEN);
        assert!(first.status.is_none());

        let second = r.handle(&action, &boot.state, &leader(), &PeerSnapshot::default());
        assert_eq!(
            second.action_result.unwrap()["initial-admin-password"],
            NOT_AVAILABLE
        );
        assert!(!CredentialVault::new(&fx.layout.credential_file).is_available());
    }
}

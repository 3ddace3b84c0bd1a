//! Where the data lives: S3-compatible object storage and the NFS mount.

use serde::Deserialize;
use tracing::{info, info_span};

use crate::config::layout::MOUNT_UNIT_NAME;
use crate::error::{Result, ValidationError};
use crate::event::RelationFields;
use crate::occ::RemoteConfigCli;
use crate::peer::CEPH_CONFIG;
use crate::render::{context, TemplateId};
use crate::system::{ServiceAction, UnitSystem};

use super::context::{Cycle, Step};
use super::outcome::DeferReason;
use super::Reconciler;

const DATADIR_MODE: u32 = 0o770;

#[derive(Debug, Deserialize)]
struct CephUser {
    keys: Vec<CephKey>,
}

#[derive(Debug, Deserialize)]
struct CephKey {
    access_key: String,
    secret_key: String,
}

/// Extracts the first access/secret key pair from the `ceph_user` JSON.
fn parse_ceph_user(raw: &str) -> std::result::Result<CephKey, ValidationError> {
    let user: CephUser = serde_json::from_str(raw)
        .map_err(|e| ValidationError::InvalidCephUser(e.to_string()))?;
    user.keys
        .into_iter()
        .next()
        .ok_or_else(|| ValidationError::InvalidCephUser("no keys in ceph_user".to_string()))
}

fn field<'f>(fields: &'f RelationFields, name: &str) -> Option<&'f str> {
    fields
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

impl Reconciler<'_> {
    pub(super) fn ceph_changed(&self, cycle: &mut Cycle<'_>, fields: &RelationFields) -> Result<Step> {
        let (Some(user), Some(host), Some(port)) = (
            field(fields, "ceph_user"),
            field(fields, "rados_gw_hostname"),
            field(fields, "rados_gw_port"),
        ) else {
            info!("Object storage relation data incomplete, nothing to do yet");
            return Ok(Step::Done);
        };
        let _step = info_span!("configure_object_storage").entered();

        let key = parse_ceph_user(user)?;
        let port: u16 = port.parse().map_err(|_| {
            ValidationError::InvalidCephUser(format!("rados_gw_port '{}' is not a port", port))
        })?;

        let ctx = context([
            ("ceph_key", key.access_key),
            ("ceph_secret", key.secret_key),
            ("rados_gw_hostname", host.to_string()),
            ("rados_gw_port", port.to_string()),
        ]);
        let rendered = self.render_to(TemplateId::CephConfig, &ctx, &self.layout.ceph_config_php)?;
        cycle.state.ceph_configured = true;

        cycle
            .peers
            .publish_canonical(cycle.role, cycle.state.initialized, CEPH_CONFIG, rendered)?;
        info!(gateway = %host, "Object storage configured");
        Ok(Step::Done)
    }

    pub(super) fn mount_changed(&self, cycle: &mut Cycle<'_>, fields: &RelationFields) -> Result<Step> {
        let (Some(hostname), Some(mountpoint)) =
            (field(fields, "hostname"), field(fields, "mountpoint"))
        else {
            return Ok(Step::Defer(DeferReason::RelationDataIncomplete));
        };

        {
            let _step = info_span!("install_mount_unit").entered();
            let ctx = context([
                ("hostname", hostname.to_string()),
                ("mountpoint", mountpoint.to_string()),
                ("target", self.layout.mount_datadir.display().to_string()),
                ("fstype", field(fields, "fstype").unwrap_or("nfs").to_string()),
                ("options", field(fields, "options").unwrap_or("defaults").to_string()),
            ]);
            self.render_to(TemplateId::MountUnit, &ctx, &self.layout.mount_unit)?;
            self.system.daemon_reload()?;
        }

        Ok(self.mount_available(cycle))
    }

    /// Moves the data directory onto the mount. Every step is attempted and
    /// failures become warnings; maintenance mode is always switched off.
    pub(super) fn mount_available(&self, cycle: &mut Cycle<'_>) -> Step {
        let _step = info_span!("move_datadir").entered();
        let target = self.layout.mount_datadir.clone();

        let result = self.system.service(ServiceAction::Start, MOUNT_UNIT_NAME);
        cycle.soft("start mount", result);

        let result = self.occ.set_maintenance_mode(true);
        cycle.soft("maintenance on", result);

        let result = self
            .system
            .chown(vec![target.clone()], &self.config.controller.web_user);
        cycle.soft("chown datadir", result);

        let result = self.touch(&target.join(".ocdata"));
        cycle.soft("touch .ocdata", result);

        let result = self.system.chmod(target.clone(), DATADIR_MODE);
        cycle.soft("chmod datadir", result);

        let result = self.occ.set_data_directory(&target);
        cycle.soft("set datadirectory", result);

        let result = self.occ.files_cleanup();
        cycle.soft("files cleanup", result);

        let result = self.occ.set_maintenance_mode(false);
        cycle.soft("maintenance off", result);

        info!(datadir = %target.display(), "Data directory moved to the mount");
        cycle.state.datadir = target;
        Step::Done
    }
}

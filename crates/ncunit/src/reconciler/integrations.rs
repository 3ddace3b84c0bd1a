//! Redis caching and the reverse proxy in front of the cluster.

use tracing::{info, info_span, warn};

use crate::error::Result;
use crate::event::RelationFields;
use crate::occ::RemoteConfigCli;
use crate::render::{context, TemplateId};
use crate::system::UnitSystem;

use super::context::{Cycle, Step};
use super::outcome::DeferReason;
use super::Reconciler;

const REDIS_SESSION_MODULE: &str = "redis_session";

fn field<'f>(fields: &'f RelationFields, name: &str) -> Option<&'f str> {
    fields.get(name).map(String::as_str).filter(|v| !v.is_empty())
}

impl Reconciler<'_> {
    pub(super) fn redis_changed(&self, cycle: &mut Cycle<'_>, fields: &RelationFields) -> Result<Step> {
        let (Some(hostname), Some(port)) = (field(fields, "hostname"), field(fields, "port")) else {
            return Ok(Step::Defer(DeferReason::RelationDataIncomplete));
        };
        let _step = info_span!("configure_redis").entered();

        let ctx = context([
            ("redis_hostname", hostname.to_string()),
            ("redis_port", port.to_string()),
            ("redis_password", field(fields, "password").unwrap_or("").to_string()),
        ]);
        self.render_to(TemplateId::RedisConfig, &ctx, &self.layout.redis_config_php)?;

        let version = self.system.php_version()?;
        let session_ini = self.layout.php_module(&version, REDIS_SESSION_MODULE);
        self.render_to(TemplateId::RedisSession, &ctx, &session_ini)?;
        self.system.enable_php_module(REDIS_SESSION_MODULE)?;

        self.restart_service()?;
        cycle.state.redis_configured = true;
        info!(host = %hostname, "Redis configured");
        Ok(Step::Done)
    }

    pub(super) fn redis_broken(&self, cycle: &mut Cycle<'_>) -> Result<Step> {
        let _step = info_span!("remove_redis").entered();
        self.remove_file(&self.layout.redis_config_php)?;

        match self.system.php_version() {
            Ok(version) => self.remove_file(&self.layout.php_module(&version, REDIS_SESSION_MODULE))?,
            Err(e) => cycle.warn("redis session ini", e),
        }

        self.restart_service()?;
        cycle.state.redis_configured = false;
        Ok(Step::Done)
    }

    pub(super) fn proxy_joined(&self, cycle: &mut Cycle<'_>, address: &str) -> Result<Step> {
        if !self.is_installed() {
            return Ok(Step::Defer(DeferReason::NotInstalled));
        }
        let _step = info_span!("trusted_proxies").entered();

        let proxies = self.occ.trusted_proxies()?;
        if proxies.iter().any(|p| p == address) {
            info!(proxy = %address, "Proxy already trusted");
        } else {
            self.occ.set_trusted_proxy(address, proxies.len())?;
            info!(proxy = %address, "Proxy trusted");
        }

        self.republish(cycle)?;
        Ok(Step::Done)
    }

    pub(super) fn proxy_departed(&self, cycle: &mut Cycle<'_>, remaining: &[String]) -> Result<Step> {
        if !self.is_installed() {
            return Ok(Step::Defer(DeferReason::NotInstalled));
        }
        let _step = info_span!("trusted_proxies").entered();

        self.occ.delete_trusted_proxies()?;
        for (index, address) in remaining.iter().enumerate() {
            self.occ.set_trusted_proxy(address, index)?;
        }
        info!(count = remaining.len(), "Trusted proxies rewritten");

        self.republish(cycle)?;
        Ok(Step::Done)
    }

    fn is_installed(&self) -> bool {
        match self.occ.status() {
            Ok(status) => status.installed,
            Err(e) => {
                warn!("Status query failed: {}", e);
                false
            }
        }
    }

    /// Settings changed config.php; share it if this node is the source.
    fn republish(&self, cycle: &mut Cycle<'_>) -> Result<()> {
        if cycle.state.initialized {
            self.publish_config(cycle)?;
        }
        Ok(())
    }
}

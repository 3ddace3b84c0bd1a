//! Operator actions. Every action answers with a JSON object; failures
//! are reported in it under `error` rather than failing the event.

use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tracing::{info, info_span};

use crate::error::{NodeError, ValidationError};
use crate::event::ActionRequest;
use crate::occ::RemoteConfigCli;

use super::context::Cycle;
use super::outcome::LocalAction;
use super::Reconciler;

pub const NOT_AVAILABLE: &str = "NOT AVAILABLE";
pub const ONLY_LEADER_MESSAGE: &str = "Only leader unit can run this action. Nothing was done.";

const TRUSTED_DOMAIN_INDEX: usize = 1;

fn invalid(action: &str, reason: &str) -> NodeError {
    ValidationError::InvalidActionParams {
        action: action.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

impl Reconciler<'_> {
    pub(super) fn run_action(&self, cycle: &mut Cycle<'_>, request: &ActionRequest) -> Value {
        let _step = info_span!("action", name = %request.name).entered();

        let result = match request.name.as_str() {
            "add_missing_indices" => self
                .occ
                .add_missing_indices()
                .map(|out| json!({ "occ-output": out.text() }))
                .map_err(NodeError::from),
            "convert_filecache_bigint" => Ok(self.convert_filecache_bigint(cycle)),
            "maintenance" => self.maintenance(request),
            "set_trusted_domain" => self.set_trusted_domain(cycle, request),
            "get_admin_password" => self.get_admin_password(),
            other => Err(invalid(other, "unknown action")),
        };

        result.unwrap_or_else(|e| {
            cycle.warn("action", &e);
            json!({ "error": e.to_string() })
        })
    }

    fn convert_filecache_bigint(&self, cycle: &mut Cycle<'_>) -> Value {
        if !cycle.role.is_leader() {
            return json!({ "message": ONLY_LEADER_MESSAGE });
        }

        let result = self
            .occ
            .set_maintenance_mode(true)
            .and_then(|_| self.occ.convert_filecache_bigint());
        let off = self.occ.set_maintenance_mode(false);
        cycle.soft("maintenance off", off);

        match result {
            Ok(out) => json!({ "occ-output": out.text() }),
            Err(e) => json!({ "error": e.to_string() }),
        }
    }

    fn maintenance(&self, request: &ActionRequest) -> Result<Value, NodeError> {
        let enable = request
            .params
            .get("enable")
            .and_then(|v| v.as_bool().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .ok_or_else(|| invalid(&request.name, "'enable' must be a boolean"))?;

        let out = self.occ.set_maintenance_mode(enable)?;
        Ok(json!({ "occ-output": out.text() }))
    }

    fn set_trusted_domain(
        &self,
        cycle: &mut Cycle<'_>,
        request: &ActionRequest,
    ) -> Result<Value, NodeError> {
        let domain = request
            .params
            .get("domain")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| invalid(&request.name, "'domain' must be a non-empty string"))?;

        self.occ.set_trusted_domain(domain, TRUSTED_DOMAIN_INDEX)?;
        info!(domain, "Trusted domain set");

        if cycle.role.is_leader() && cycle.state.initialized {
            self.push_trusted_domains(cycle, None)?;
            self.publish_config(cycle)?;
        }
        Ok(json!({ "trusted-domain": domain }))
    }

    fn get_admin_password(&self) -> Result<Value, NodeError> {
        let secret = self.vault.take()?;
        self.journal.record(LocalAction::TakeCredential);

        let value = match &secret {
            Some(password) => password.expose_secret(),
            None => NOT_AVAILABLE,
        };
        Ok(json!({ "initial-admin-password": value }))
    }
}

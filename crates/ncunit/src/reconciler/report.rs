use std::path::Path;

use serde::Serialize;

use crate::error::ErrorClass;
use crate::event::Event;
use crate::peer::WriteScope;
use crate::state::LifecycleState;
use crate::status::DisplayStatus;

use super::outcome::{LocalAction, Outcome, Reconciled, Warning};

/// Lifecycle flags without the stored config.php, which carries
/// credentials.
#[derive(Debug, Serialize)]
pub struct StateFlags<'a> {
    pub fetched: bool,
    pub database_available: bool,
    pub initialized: bool,
    pub apache_configured: bool,
    pub php_configured: bool,
    pub ceph_configured: bool,
    pub redis_configured: bool,
    pub config_drifted: bool,
    pub datadir: &'a Path,
}

impl<'a> From<&'a LifecycleState> for StateFlags<'a> {
    fn from(state: &'a LifecycleState) -> Self {
        Self {
            fetched: state.fetched,
            database_available: state.database_available,
            initialized: state.initialized,
            apache_configured: state.apache_configured,
            php_configured: state.php_configured,
            ceph_configured: state.ceph_configured,
            redis_configured: state.redis_configured,
            config_drifted: state.config_drifted,
            datadir: &state.datadir,
        }
    }
}

/// Peer writes are reported by key only.
#[derive(Debug, Serialize)]
pub struct PeerWriteKey<'a> {
    pub scope: &'a WriteScope,
    pub key: &'a str,
}

/// The JSON document the host prints after handling an event.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub event: &'static str,
    pub outcome: &'static str,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<ErrorClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'a DisplayStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload_version: Option<&'a str>,
    pub state: StateFlags<'a>,
    pub actions: &'a [LocalAction],
    pub peer_writes: Vec<PeerWriteKey<'a>>,
    pub warnings: &'a [Warning],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_result: Option<&'a serde_json::Value>,
}

impl Reconciled {
    pub fn report(&self, event: &Event) -> Report<'_> {
        let reason = match &self.outcome {
            Outcome::Deferred(reason) => Some(reason.to_string()),
            Outcome::Fatal(error) => Some(error.to_string()),
            Outcome::Applied | Outcome::Halted => None,
        };

        Report {
            event: event.name(),
            outcome: self.outcome.label(),
            exit_code: self.outcome.exit_code(),
            class: self.outcome.class(),
            reason,
            status: self.status.as_ref(),
            workload_version: self.workload_version.as_deref(),
            state: StateFlags::from(&self.state),
            actions: &self.actions,
            peer_writes: self
                .peer_writes
                .iter()
                .map(|w| PeerWriteKey {
                    scope: &w.scope,
                    key: &w.key,
                })
                .collect(),
            warnings: &self.warnings,
            action_result: self.action_result.as_ref(),
        }
    }
}

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{ErrorClass, NodeError};
use crate::peer::PeerWrite;
use crate::state::LifecycleState;
use crate::status::DisplayStatus;

/// Exit code telling the host to redeliver the event later.
pub const EXIT_DEFERRED: i32 = 75;
pub const EXIT_FATAL: i32 = 1;

/// Why an event was deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferReason {
    /// The leader cannot apply cluster settings before the database exists.
    WaitingForDatabase,
    NotInitialized,
    /// A follower has not received the leader's config.php yet.
    CanonicalConfigMissing,
    /// Nextcloud did not report itself installed within the retry budget.
    ApplicationNotReady,
    RelationDataIncomplete,
    NotInstalled,
}

impl DeferReason {
    pub fn class(&self) -> ErrorClass {
        match self {
            DeferReason::ApplicationNotReady => ErrorClass::BoundedRetry,
            _ => ErrorClass::RecoverableWait,
        }
    }
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DeferReason::WaitingForDatabase => "waiting for the database",
            DeferReason::NotInitialized => "Nextcloud is not initialized yet",
            DeferReason::CanonicalConfigMissing => "the leader has not published config.php yet",
            DeferReason::ApplicationNotReady => "Nextcloud is not installed yet",
            DeferReason::RelationDataIncomplete => "relation data is incomplete",
            DeferReason::NotInstalled => "Nextcloud is not installed",
        };
        f.write_str(text)
    }
}

#[derive(Debug)]
pub enum Outcome {
    Applied,
    Deferred(DeferReason),
    Fatal(NodeError),
    /// Clean stop in an expected wait state.
    Halted,
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Applied | Outcome::Halted => 0,
            Outcome::Deferred(_) => EXIT_DEFERRED,
            Outcome::Fatal(_) => EXIT_FATAL,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Applied => "applied",
            Outcome::Deferred(_) => "deferred",
            Outcome::Fatal(_) => "fatal",
            Outcome::Halted => "halted",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Outcome::Fatal(_))
    }

    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            Outcome::Deferred(reason) => Some(reason.class()),
            Outcome::Fatal(error) => Some(error.class()),
            Outcome::Applied | Outcome::Halted => None,
        }
    }
}

/// A local side effect performed while handling an event. Commands are
/// recorded with secrets redacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocalAction {
    Occ { command: String },
    System { command: String },
    WriteFile { path: PathBuf },
    RemoveFile { path: PathBuf },
    StoreCredential,
    TakeCredential,
}

/// A step that failed without aborting the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub step: &'static str,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.message)
    }
}

/// Everything one `handle` call produced. The host persists `state`
/// unless the outcome is fatal and applies `peer_writes` to the relation.
#[derive(Debug)]
pub struct Reconciled {
    pub state: LifecycleState,
    pub actions: Vec<LocalAction>,
    pub peer_writes: Vec<PeerWrite>,
    pub outcome: Outcome,
    pub status: Option<DisplayStatus>,
    pub warnings: Vec<Warning>,
    pub workload_version: Option<String>,
    pub action_result: Option<serde_json::Value>,
}

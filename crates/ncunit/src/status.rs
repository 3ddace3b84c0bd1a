//! Projection of the lifecycle state onto an operator-facing status.

use std::fmt;

use serde::Serialize;

use crate::state::LifecycleState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", content = "message", rename_all = "snake_case")]
pub enum DisplayStatus {
    Active(String),
    Waiting(String),
    Blocked(String),
    Maintenance(String),
}

impl DisplayStatus {
    pub fn message(&self) -> &str {
        match self {
            DisplayStatus::Active(m)
            | DisplayStatus::Waiting(m)
            | DisplayStatus::Blocked(m)
            | DisplayStatus::Maintenance(m) => m,
        }
    }
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            DisplayStatus::Active(_) => "active",
            DisplayStatus::Waiting(_) => "waiting",
            DisplayStatus::Blocked(_) => "blocked",
            DisplayStatus::Maintenance(_) => "maintenance",
        };
        write!(f, "{}: {}", level, self.message())
    }
}

pub const UNKNOWN_VERSION: &str = "unknown version";

/// First unmet precondition wins. `version` is `None` when the version
/// query failed; that is reported, not treated as an error.
pub fn project(state: &LifecycleState, version: Option<&str>) -> DisplayStatus {
    if !state.fetched {
        return DisplayStatus::Blocked("Nextcloud not fetched".to_string());
    }
    if !state.database_available {
        return DisplayStatus::Blocked("No database".to_string());
    }
    if !state.initialized {
        return DisplayStatus::Blocked("Nextcloud not initialized".to_string());
    }
    if !state.apache_configured {
        return DisplayStatus::Blocked("Apache not configured".to_string());
    }
    if !state.php_configured {
        return DisplayStatus::Blocked("PHP not configured".to_string());
    }
    if state.config_drifted {
        return DisplayStatus::Waiting("Local changes to config.php".to_string());
    }

    DisplayStatus::Active(version.unwrap_or(UNKNOWN_VERSION).to_string())
}

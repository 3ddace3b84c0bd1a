//! Detection of local edits to config.php.
//!
//! Advisory only: a drifted node keeps running, its status turns to
//! waiting, and the next leader publish or follower sync overwrites the
//! file.

use crate::state::LifecycleState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    InSync,
    Drifted,
    /// No canonical value is known yet, nothing to compare against.
    Unknown,
}

/// Compares the on-disk config.php with the canonical value. A missing
/// file counts as different from any known canonical value.
pub fn detect(on_disk: Option<&str>, canonical: Option<&str>) -> Drift {
    match (on_disk, canonical) {
        (_, None) => Drift::Unknown,
        (Some(disk), Some(expected)) if disk == expected => Drift::InSync,
        _ => Drift::Drifted,
    }
}

/// Records the verdict in `state` and logs it.
pub fn apply(state: &mut LifecycleState, drift: Drift) {
    match drift {
        Drift::InSync => {
            if state.config_drifted {
                log::info!("config.php matches the cluster configuration again");
            }
            state.config_drifted = false;
        }
        Drift::Drifted => {
            log::warn!(
                "Local changes to config.php detected, they will be overwritten by the next configuration update"
            );
            state.config_drifted = true;
        }
        Drift::Unknown => {
            log::debug!("No canonical config.php known, drift check skipped");
        }
    }
}

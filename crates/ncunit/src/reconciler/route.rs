//! Which role may handle an event and what it needs first.

use crate::event::Event;
use crate::role::Role;
use crate::state::LifecycleState;

use super::outcome::DeferReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Any,
    LeaderOnly,
    FollowerOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMissing {
    Defer,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    None,
    Initialized { on_missing: OnMissing },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub gate: Gate,
    pub readiness: Readiness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Run,
    Skip(&'static str),
    Defer(DeferReason),
}

impl Route {
    const fn new(gate: Gate, readiness: Readiness) -> Self {
        Self { gate, readiness }
    }

    pub fn admit(&self, role: Role, state: &LifecycleState) -> Admission {
        match (self.gate, role) {
            (Gate::LeaderOnly, Role::Follower) => return Admission::Skip("leader only"),
            (Gate::FollowerOnly, Role::Leader) => return Admission::Skip("follower only"),
            _ => {}
        }

        match self.readiness {
            Readiness::Initialized { on_missing } if !state.initialized => match on_missing {
                OnMissing::Defer => Admission::Defer(DeferReason::NotInitialized),
                OnMissing::Skip => Admission::Skip("not initialized"),
            },
            _ => Admission::Run,
        }
    }
}

const ANY: Route = Route::new(Gate::Any, Readiness::None);

/// The routing table.
pub fn route(event: &Event) -> Route {
    use Event::*;

    let defer = Readiness::Initialized {
        on_missing: OnMissing::Defer,
    };
    let skip = Readiness::Initialized {
        on_missing: OnMissing::Skip,
    };

    match event {
        LeaderElected => Route::new(Gate::LeaderOnly, skip),
        PeerJoined { .. } => Route::new(Gate::LeaderOnly, defer),
        PeerChanged { .. } => Route::new(Gate::FollowerOnly, Readiness::None),
        PeerDeparted { .. } => Route::new(Gate::LeaderOnly, skip),
        ExternalStorageRelationChanged { .. } => Route::new(Gate::LeaderOnly, defer),
        ProxyJoined { .. } | ProxyDeparted { .. } => Route::new(Gate::LeaderOnly, Readiness::None),
        Install
        | ConfigChanged
        | Start
        | UpdateStatus
        | DatabaseCreated(_)
        | DatabaseRemoved
        | PeerBroken
        | StorageAttached { .. }
        | StorageDetaching
        | ExternalMountRelationChanged { .. }
        | ExternalMountAvailable
        | RedisRelationChanged { .. }
        | RedisRelationBroken
        | Action(_) => ANY,
    }
}

//! The two hook commands. Output goes to the given writer so the report
//! can be captured; logs go to stderr through tracing.

use std::io::Write;
use std::path::PathBuf;

use tracing::{info, warn};

use ncunit::event::Event;
use ncunit::state::{LifecycleState, StateStore};
use ncunit::status::project;
use ncunit::{
    CommandSystem, Layout, OccShell, PeerStore, Reconciler, Role, RoleContext, TemplateEngine,
    UnitConfig,
};

use crate::error::HookError;

/// Arguments of one `handle` invocation.
#[derive(Debug)]
pub struct HandleRequest {
    pub event: String,
    pub role: Role,
    pub unit: String,
    pub ingress_address: String,
    pub peer_store: Option<PathBuf>,
}

/// Loads state and the peer replica, reconciles once, persists the results
/// and writes the JSON report. Returns the process exit code.
pub fn handle(
    layout: &Layout,
    config: &UnitConfig,
    request: HandleRequest,
    out: &mut impl Write,
) -> Result<i32, HookError> {
    let event: Event = serde_json::from_str(&request.event).map_err(HookError::Event)?;
    let role = RoleContext::new(
        request.role,
        request.unit.as_str(),
        request.ingress_address,
    );

    let store = StateStore::new(&layout.state_file);
    let state = store.load_or(LifecycleState::with_datadir(&layout.default_datadir))?;

    let peer_path = request
        .peer_store
        .unwrap_or_else(|| layout.peer_file.clone());
    let mut peers = PeerStore::load(&peer_path)?;
    admit_membership(&mut peers, &event);

    let occ = OccShell::new(&layout.nextcloud_root, &config.controller.web_user);
    let system = CommandSystem::new();
    let renderer = TemplateEngine::new();
    let reconciler = Reconciler::new(config, layout, &occ, &system, &renderer);
    let reconciled = reconciler.handle(&event, &state, &role, peers.snapshot());

    if reconciled.outcome.is_fatal() {
        warn!("Event failed, state and peer data left unchanged");
    } else {
        store.save(&reconciled.state)?;
        peers.apply(&role, reconciled.state.initialized, &reconciled.peer_writes)?;
    }
    retire_membership(&mut peers, &event);
    peers.save(&peer_path)?;

    let report =
        serde_json::to_string_pretty(&reconciled.report(&event)).map_err(HookError::Output)?;
    writeln!(out, "{}", report)?;

    info!(
        event = %event,
        outcome = reconciled.outcome.label(),
        "Hook finished"
    );
    Ok(reconciled.outcome.exit_code())
}

/// Writes the status projected from the persisted state. No command is run,
/// so the version is not reported.
pub fn status(layout: &Layout, out: &mut impl Write) -> Result<i32, HookError> {
    let state = StateStore::new(&layout.state_file)
        .load_or(LifecycleState::with_datadir(&layout.default_datadir))?;
    let projected = project(&state, None);

    let json = serde_json::to_string_pretty(&projected).map_err(HookError::Output)?;
    writeln!(out, "{}", json)?;
    Ok(0)
}

/// Membership the host announces with the event, recorded before handling.
fn admit_membership(peers: &mut PeerStore, event: &Event) {
    match event {
        Event::PeerJoined { unit: Some(unit) } => peers.join(unit),
        Event::PeerChanged { unit, data, app } => {
            if let Some(unit) = unit {
                peers.merge_unit(unit, data);
            }
            peers.merge_app(app);
        }
        _ => {}
    }
}

/// Departures take effect after handling, so the handler still sees the
/// departing unit.
fn retire_membership(peers: &mut PeerStore, event: &Event) {
    match event {
        Event::PeerDeparted { unit: Some(unit) } => peers.depart(unit),
        Event::PeerBroken => peers.clear(),
        _ => {}
    }
}

//! Test harness for isolated reconciler runs.
//!
//! A `TestNode` owns a temporary directory that stands in for the unit's
//! filesystem, stub occ and OS collaborators, and a persisted state file.
//! Each `handle` call behaves like one hook invocation: load state, handle
//! the event, persist the new state unless the outcome is fatal.

#![allow(dead_code)]

use std::path::Path;

use tempfile::TempDir;

use ncunit::config::{Layout, UnitConfig};
use ncunit::event::Event;
use ncunit::peer::{PeerSnapshot, PeerStore};
use ncunit::reconciler::{Reconciled, Reconciler};
use ncunit::render::TemplateEngine;
use ncunit::role::{Role, RoleContext, UnitId};
use ncunit::state::{LifecycleState, StateStore};
use ncunit::stub::{RecordingSystem, StubOcc};

use super::builders::UnitConfigBuilder;

pub struct TestNode {
    temp_dir: TempDir,
    pub layout: Layout,
    pub config: UnitConfig,
    pub occ: StubOcc,
    pub system: RecordingSystem,
    pub role: RoleContext,
    renderer: TemplateEngine,
    store: StateStore,
}

impl TestNode {
    pub fn new(role: RoleContext) -> Self {
        Self::with_config(role, UnitConfigBuilder::new().build())
    }

    pub fn with_config(role: RoleContext, config: UnitConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let layout = Layout::rooted(temp_dir.path());
        let store = StateStore::new(&layout.state_file);

        Self {
            temp_dir,
            layout,
            config,
            occ: StubOcc::new(),
            system: RecordingSystem::new(),
            role,
            renderer: TemplateEngine::new(),
            store,
        }
    }

    pub fn leader() -> Self {
        Self::new(RoleContext::new(Role::Leader, "nextcloud/0", "10.0.0.10"))
    }

    pub fn follower() -> Self {
        Self::new(RoleContext::new(Role::Follower, "nextcloud/1", "10.0.0.11"))
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn unit(&self) -> &UnitId {
        &self.role.unit
    }

    /// The persisted state, or a fresh one.
    pub fn state(&self) -> LifecycleState {
        self.store
            .load_or(LifecycleState::with_datadir(&self.layout.default_datadir))
            .expect("Failed to load state")
    }

    pub fn set_state(&self, state: &LifecycleState) {
        self.store.save(state).expect("Failed to save state");
    }

    pub fn set_role(&mut self, role: Role) {
        self.role.role = role;
    }

    /// One hook invocation.
    pub fn handle(&self, event: &Event, peers: &PeerSnapshot) -> Reconciled {
        let state = self.state();
        let reconciler = Reconciler::new(
            &self.config,
            &self.layout,
            &self.occ,
            &self.system,
            &self.renderer,
        );

        let out = reconciler.handle(event, &state, &self.role, peers);
        if !out.outcome.is_fatal() {
            self.store.save(&out.state).expect("Failed to save state");
        }
        out
    }

    /// Handles an event with an empty peer relation.
    pub fn handle_alone(&self, event: &Event) -> Reconciled {
        self.handle(event, &PeerSnapshot::default())
    }

    pub fn read_config_php(&self) -> Option<String> {
        std::fs::read_to_string(&self.layout.config_php).ok()
    }

    /// Writes config.php as an installation would.
    pub fn write_config_php(&self, content: &str) {
        ncunit::storage::write_file(&self.layout.config_php, content)
            .expect("Failed to write config.php");
    }
}

/// Units sharing one peer relation. Unit 0 starts as leader.
pub struct TestCluster {
    pub nodes: Vec<TestNode>,
    pub peers: PeerStore,
}

impl TestCluster {
    pub fn new(size: usize) -> Self {
        let nodes: Vec<TestNode> = (0..size)
            .map(|i| {
                let role = if i == 0 { Role::Leader } else { Role::Follower };
                TestNode::new(RoleContext::new(
                    role,
                    format!("nextcloud/{}", i),
                    format!("10.0.0.{}", 10 + i),
                ))
            })
            .collect();

        let mut peers = PeerStore::default();
        for node in &nodes {
            peers.join(node.unit());
        }

        Self { nodes, peers }
    }

    pub fn leader(&self) -> &TestNode {
        &self.nodes[0]
    }

    /// Delivers an event to one unit and applies its peer writes to the
    /// shared relation.
    pub fn deliver(&mut self, index: usize, event: &Event) -> Reconciled {
        let node = &self.nodes[index];
        let out = node.handle(event, self.peers.snapshot());
        if !out.outcome.is_fatal() {
            self.peers
                .apply(&node.role, out.state.initialized, &out.peer_writes)
                .expect("Peer writes rejected");
        }
        out
    }

    /// Delivers an event to every unit in order.
    pub fn broadcast(&mut self, event: &Event) -> Vec<Reconciled> {
        (0..self.nodes.len())
            .map(|i| self.deliver(i, event))
            .collect()
    }
}

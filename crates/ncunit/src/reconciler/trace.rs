//! Collaborator wrappers that journal every call as a `LocalAction`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::command::CommandOutput;
use crate::occ::{CliError, OccCommand, RemoteConfigCli};
use crate::system::{SystemCommand, SystemError, UnitSystem};

use super::outcome::LocalAction;

/// Local actions of the event being handled.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal(Rc<RefCell<Vec<LocalAction>>>);

impl Journal {
    pub fn record(&self, action: LocalAction) {
        self.0.borrow_mut().push(action);
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn drain(&self) -> Vec<LocalAction> {
        self.0.take()
    }
}

pub(crate) struct TracedOcc<'a> {
    inner: &'a dyn RemoteConfigCli,
    journal: Journal,
}

impl<'a> TracedOcc<'a> {
    pub fn new(inner: &'a dyn RemoteConfigCli, journal: Journal) -> Self {
        Self { inner, journal }
    }
}

impl RemoteConfigCli for TracedOcc<'_> {
    fn execute(&self, command: &OccCommand) -> Result<CommandOutput, CliError> {
        self.journal.record(LocalAction::Occ {
            command: command.redacted(),
        });
        self.inner.execute(command)
    }
}

pub(crate) struct TracedSystem<'a> {
    inner: &'a dyn UnitSystem,
    journal: Journal,
}

impl<'a> TracedSystem<'a> {
    pub fn new(inner: &'a dyn UnitSystem, journal: Journal) -> Self {
        Self { inner, journal }
    }
}

impl UnitSystem for TracedSystem<'_> {
    fn execute(&self, command: &SystemCommand) -> Result<CommandOutput, SystemError> {
        self.journal.record(LocalAction::System {
            command: command.to_string(),
        });
        self.inner.execute(command)
    }
}

//! In-memory collaborators for tests and dry runs.
//!
//! `StubOcc` models the parts of occ the controller reads back (install
//! status, trusted domains, trusted proxies) and records every command.
//! `RecordingSystem` records OS commands and answers `php -v`. Both can be
//! told to fail commands by prefix.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};

use crate::command::CommandOutput;
use crate::occ::{CliError, OccCommand, RemoteConfigCli};
use crate::system::{SystemCommand, SystemError, UnitSystem};

#[derive(Debug)]
pub struct StubOcc {
    installed: Cell<bool>,
    version: RefCell<String>,
    status_script: RefCell<VecDeque<CommandOutput>>,
    failures: RefCell<Vec<String>>,
    trusted_domains: RefCell<BTreeMap<usize, String>>,
    trusted_proxies: RefCell<BTreeMap<usize, String>>,
    calls: RefCell<Vec<OccCommand>>,
}

impl Default for StubOcc {
    fn default() -> Self {
        Self {
            installed: Cell::new(false),
            version: RefCell::new("27.1.3".to_string()),
            status_script: RefCell::new(VecDeque::new()),
            failures: RefCell::new(Vec::new()),
            trusted_domains: RefCell::new(BTreeMap::from([(0, "localhost".to_string())])),
            trusted_proxies: RefCell::new(BTreeMap::new()),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl StubOcc {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stub whose application is already installed.
    pub fn installed() -> Self {
        let stub = Self::default();
        stub.installed.set(true);
        stub
    }

    pub fn set_installed(&self, installed: bool) {
        self.installed.set(installed);
    }

    pub fn set_version(&self, version: &str) {
        *self.version.borrow_mut() = version.to_string();
    }

    /// Queues raw outputs for upcoming `status` calls. Once the queue is
    /// empty, status reflects the modelled install state again.
    pub fn script_status(&self, outputs: impl IntoIterator<Item = CommandOutput>) {
        self.status_script.borrow_mut().extend(outputs);
    }

    /// Makes every command whose argument line starts with `prefix` exit 1.
    pub fn fail_on(&self, prefix: &str) {
        self.failures.borrow_mut().push(prefix.to_string());
    }

    pub fn clear_failures(&self) {
        self.failures.borrow_mut().clear();
    }

    pub fn set_trusted_domains(&self, domains: &[&str]) {
        *self.trusted_domains.borrow_mut() = domains
            .iter()
            .enumerate()
            .map(|(i, d)| (i, d.to_string()))
            .collect();
    }

    pub fn trusted_domain_list(&self) -> Vec<String> {
        self.trusted_domains.borrow().values().cloned().collect()
    }

    pub fn trusted_proxy_list(&self) -> Vec<String> {
        self.trusted_proxies.borrow().values().cloned().collect()
    }

    /// Every command seen so far, redacted, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().iter().map(OccCommand::redacted).collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.count(prefix) > 0
    }

    pub fn reset_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn status_output(&self) -> CommandOutput {
        if let Some(scripted) = self.status_script.borrow_mut().pop_front() {
            return scripted;
        }
        let version = self.version.borrow();
        CommandOutput::ok(format!(
            r#"{{"installed":{},"version":"{}.0","versionstring":"{}","maintenance":false}}"#,
            self.installed.get(),
            version,
            version
        ))
    }

    fn list_for(&self, key: &str) -> Option<&RefCell<BTreeMap<usize, String>>> {
        match key {
            "trusted_domains" => Some(&self.trusted_domains),
            "trusted_proxies" => Some(&self.trusted_proxies),
            _ => None,
        }
    }

    fn model(&self, args: &[String]) -> CommandOutput {
        let arg = |i: usize| args.get(i).map(String::as_str).unwrap_or("");

        match arg(0) {
            "status" => self.status_output(),
            "maintenance:install" => {
                self.installed.set(true);
                CommandOutput::ok("Nextcloud was successfully installed")
            }
            "config:system:get" => match self.list_for(arg(1)) {
                Some(list) if !list.borrow().is_empty() => {
                    let values: Vec<String> = list.borrow().values().cloned().collect();
                    CommandOutput::ok(values.join("\n"))
                }
                _ => CommandOutput::failed(1, ""),
            },
            "config:system:delete" => {
                if let Some(list) = self.list_for(arg(1)) {
                    list.borrow_mut().clear();
                }
                CommandOutput::ok(format!("System config value {} deleted", arg(1)))
            }
            "config:system:set" => {
                if let (Some(list), Ok(index)) = (self.list_for(arg(1)), arg(2).parse::<usize>()) {
                    let value = arg(3).trim_start_matches("--value=").to_string();
                    list.borrow_mut().insert(index, value);
                }
                CommandOutput::ok(format!("System config value {} set", arg(1)))
            }
            other => CommandOutput::ok(format!("{} done", other)),
        }
    }
}

impl RemoteConfigCli for StubOcc {
    fn execute(&self, command: &OccCommand) -> Result<CommandOutput, CliError> {
        self.calls.borrow_mut().push(command.clone());

        let line = command.args().join(" ");
        if self.failures.borrow().iter().any(|p| line.starts_with(p.as_str())) {
            return Ok(CommandOutput::failed(1, format!("scripted failure: {}", line)));
        }

        Ok(self.model(command.args()))
    }
}

#[derive(Debug)]
pub struct RecordingSystem {
    php_version_output: RefCell<String>,
    failures: RefCell<Vec<String>>,
    calls: RefCell<Vec<SystemCommand>>,
}

impl Default for RecordingSystem {
    fn default() -> Self {
        Self {
            php_version_output: RefCell::new(
                "PHP 8.1.2-1ubuntu2.14 (cli) (built: Aug 18 2023 11:41:11) (NTS)".to_string(),
            ),
            failures: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl RecordingSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every command whose display form starts with `prefix` exit 1,
    /// e.g. `"resource-get"` or `"systemctl restart"`.
    pub fn fail_on(&self, prefix: &str) {
        self.failures.borrow_mut().push(prefix.to_string());
    }

    pub fn clear_failures(&self) {
        self.failures.borrow_mut().clear();
    }

    pub fn set_php_version_output(&self, output: &str) {
        *self.php_version_output.borrow_mut() = output.to_string();
    }

    pub fn commands(&self) -> Vec<SystemCommand> {
        self.calls.borrow().clone()
    }

    /// Display forms of every command seen so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().iter().map(ToString::to_string).collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.count(prefix) > 0
    }

    pub fn reset_calls(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl UnitSystem for RecordingSystem {
    fn execute(&self, command: &SystemCommand) -> Result<CommandOutput, SystemError> {
        self.calls.borrow_mut().push(command.clone());

        let line = command.to_string();
        if self.failures.borrow().iter().any(|p| line.starts_with(p.as_str())) {
            return Ok(CommandOutput::failed(1, format!("scripted failure: {}", line)));
        }

        Ok(match command {
            SystemCommand::PhpVersion => CommandOutput::ok(self.php_version_output.borrow().clone()),
            _ => CommandOutput::ok(""),
        })
    }
}

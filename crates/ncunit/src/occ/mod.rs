//! Typed access to Nextcloud's `occ` command line.
//!
//! Implementors provide `execute`; every typed operation is a provided
//! method built on it, so a stub only has to script raw outputs.

mod shell;

pub use shell::OccShell;

use std::path::Path;

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::command::CommandOutput;
use crate::config::OverwriteProtocol;
use crate::event::DatabaseEndpoint;
use crate::sanitize::redact_args;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'occ {command}' exited with code {code}: {message}")]
    Failed {
        command: String,
        code: i32,
        message: String,
    },

    #[error("Failed to parse occ output: {0}")]
    Parse(String),
}

/// One `occ` invocation: the argument list after `occ`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccCommand {
    args: Vec<String>,
}

impl OccCommand {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The occ subcommand, e.g. `config:system:set`.
    pub fn subcommand(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }

    /// The argument list with credentials masked, safe for logs.
    pub fn redacted(&self) -> String {
        redact_args(&self.args)
    }

    fn system_set(key: &str, value: impl AsRef<str>) -> Self {
        Self::new([
            "config:system:set".to_string(),
            key.to_string(),
            format!("--value={}", value.as_ref()),
        ])
    }

    fn system_set_indexed(key: &str, index: usize, value: &str) -> Self {
        Self::new([
            "config:system:set".to_string(),
            key.to_string(),
            index.to_string(),
            format!("--value={}", value),
        ])
    }
}

/// Installation status as reported by `occ status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppStatus {
    pub installed: bool,
    pub version: Option<String>,
    pub maintenance: bool,
}

#[derive(Deserialize)]
struct RawStatus {
    #[serde(default)]
    installed: bool,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    versionstring: Option<String>,
    #[serde(default)]
    maintenance: bool,
}

/// Extracts the status object from `occ status --output=json` output.
///
/// occ may print PHP warnings around the JSON, so the first `{...}` span is
/// parsed rather than the whole stream.
pub fn parse_status(stdout: &str) -> Result<AppStatus, CliError> {
    let pattern = Regex::new(r"(?s)\{.*?\}").map_err(|e| CliError::Parse(e.to_string()))?;
    let json = pattern
        .find(stdout)
        .ok_or_else(|| CliError::Parse("no JSON object in status output".to_string()))?;

    let raw: RawStatus =
        serde_json::from_str(json.as_str()).map_err(|e| CliError::Parse(e.to_string()))?;

    Ok(AppStatus {
        installed: raw.installed,
        version: raw
            .versionstring
            .or(raw.version)
            .filter(|v| !v.trim().is_empty()),
        maintenance: raw.maintenance,
    })
}

/// Parameters of the one-time `maintenance:install` call.
pub struct BootstrapRequest<'a> {
    pub database: &'a DatabaseEndpoint,
    pub admin_user: &'a str,
    pub admin_password: &'a SecretString,
    pub data_dir: &'a Path,
}

impl BootstrapRequest<'_> {
    fn command(&self) -> OccCommand {
        OccCommand::new([
            "maintenance:install".to_string(),
            "--database".to_string(),
            "pgsql".to_string(),
            "--database-name".to_string(),
            self.database.name.clone(),
            "--database-host".to_string(),
            self.database.address(),
            "--database-user".to_string(),
            self.database.user.clone(),
            "--database-pass".to_string(),
            self.database.password.expose_secret().to_string(),
            "--admin-user".to_string(),
            self.admin_user.to_string(),
            "--admin-pass".to_string(),
            self.admin_password.expose_secret().to_string(),
            "--data-dir".to_string(),
            self.data_dir.display().to_string(),
        ])
    }
}

/// The remote configuration CLI of the managed application.
pub trait RemoteConfigCli {
    /// Runs one occ command and captures its exit code and output.
    fn execute(&self, command: &OccCommand) -> Result<CommandOutput, CliError>;

    /// Runs a command and turns a non-zero exit into `CliError::Failed`.
    fn run_checked(&self, command: OccCommand) -> Result<CommandOutput, CliError> {
        let output = self.execute(&command)?;
        if output.success() {
            Ok(output)
        } else {
            Err(CliError::Failed {
                command: command.redacted(),
                code: output.code,
                message: output.text(),
            })
        }
    }

    fn status(&self) -> Result<AppStatus, CliError> {
        let output = self.run_checked(OccCommand::new([
            "status",
            "--output=json",
            "--no-warnings",
        ]))?;
        parse_status(&output.stdout)
    }

    fn bootstrap(&self, request: &BootstrapRequest<'_>) -> Result<CommandOutput, CliError> {
        self.run_checked(request.command())
    }

    fn set_trusted_domain(&self, domain: &str, index: usize) -> Result<CommandOutput, CliError> {
        self.run_checked(OccCommand::system_set_indexed("trusted_domains", index, domain))
    }

    fn delete_trusted_domains(&self) -> Result<CommandOutput, CliError> {
        self.run_checked(OccCommand::new(["config:system:delete", "trusted_domains"]))
    }

    /// Current trusted domains in index order. An unset key reads as empty.
    fn trusted_domains(&self) -> Result<Vec<String>, CliError> {
        let output =
            self.execute(&OccCommand::new(["config:system:get", "trusted_domains"]))?;
        Ok(split_list(&output))
    }

    fn set_trusted_proxy(&self, proxy: &str, index: usize) -> Result<CommandOutput, CliError> {
        self.run_checked(OccCommand::system_set_indexed("trusted_proxies", index, proxy))
    }

    fn delete_trusted_proxies(&self) -> Result<CommandOutput, CliError> {
        self.run_checked(OccCommand::new(["config:system:delete", "trusted_proxies"]))
    }

    fn trusted_proxies(&self) -> Result<Vec<String>, CliError> {
        let output =
            self.execute(&OccCommand::new(["config:system:get", "trusted_proxies"]))?;
        Ok(split_list(&output))
    }

    fn set_maintenance_mode(&self, enable: bool) -> Result<CommandOutput, CliError> {
        let flag = if enable { "--on" } else { "--off" };
        self.run_checked(OccCommand::new(["maintenance:mode", flag]))
    }

    fn set_overwrite_protocol(&self, protocol: OverwriteProtocol) -> Result<CommandOutput, CliError> {
        self.run_checked(OccCommand::system_set("overwriteprotocol", protocol.as_str()))
    }

    fn set_overwrite_cli_url(&self, url: &str) -> Result<CommandOutput, CliError> {
        self.run_checked(OccCommand::system_set("overwrite.cli.url", url))
    }

    fn set_default_phone_region(&self, code: &str) -> Result<CommandOutput, CliError> {
        self.run_checked(OccCommand::system_set("default_phone_region", code))
    }

    fn set_background_cron(&self) -> Result<CommandOutput, CliError> {
        self.run_checked(OccCommand::new(["background:cron", "--no-warnings"]))
    }

    fn set_debug(&self, enable: bool) -> Result<CommandOutput, CliError> {
        self.run_checked(OccCommand::new([
            "config:system:set".to_string(),
            "debug".to_string(),
            "--type=boolean".to_string(),
            format!("--value={}", enable),
        ]))
    }

    /// Drops `index.php` from generated URLs. Needs `update_htaccess` after.
    fn set_rewrite_base(&self) -> Result<CommandOutput, CliError> {
        self.run_checked(OccCommand::system_set("htaccess.RewriteBase", "/"))
    }

    fn update_htaccess(&self) -> Result<CommandOutput, CliError> {
        self.run_checked(OccCommand::new(["maintenance:update:htaccess"]))
    }

    fn add_missing_indices(&self) -> Result<CommandOutput, CliError> {
        self.run_checked(OccCommand::new(["db:add-missing-indices"]))
    }

    fn convert_filecache_bigint(&self) -> Result<CommandOutput, CliError> {
        self.run_checked(OccCommand::new([
            "db:convert-filecache-bigint",
            "--no-interaction",
        ]))
    }

    fn set_data_directory(&self, path: &Path) -> Result<CommandOutput, CliError> {
        self.run_checked(OccCommand::system_set(
            "datadirectory",
            path.display().to_string(),
        ))
    }

    fn files_cleanup(&self) -> Result<CommandOutput, CliError> {
        self.run_checked(OccCommand::new(["files:cleanup"]))
    }
}

fn split_list(output: &CommandOutput) -> Vec<String> {
    if !output.success() {
        return Vec::new();
    }
    output
        .stdout
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

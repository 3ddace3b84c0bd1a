//! Operating-system side effects: packages, payload, services, ownership,
//! web-server and PHP module enablement.

mod host;

pub use host::CommandSystem;

use std::fmt;
use std::path::PathBuf;

use regex::Regex;
use thiserror::Error;

use crate::command::CommandOutput;
use crate::sanitize::redact_url;

/// Packages the web node needs on top of a base image.
pub const DEPENDENCIES: &[&str] = &[
    "apache2",
    "bzip2",
    "curl",
    "libapache2-mod-php",
    "php-apcu",
    "php-bcmath",
    "php-curl",
    "php-gd",
    "php-gmp",
    "php-imagick",
    "php-intl",
    "php-mbstring",
    "php-pgsql",
    "php-redis",
    "php-xml",
    "php-zip",
    "pigz",
    "postgresql-client",
];

/// Apache modules Nextcloud relies on.
pub const APACHE_MODULES: &[&str] = &[
    "rewrite", "headers", "env", "dir", "mime", "setenvif", "proxy_fcgi",
];

#[derive(Error, Debug)]
pub enum SystemError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with code {code}: {message}")]
    Failed {
        command: String,
        code: i32,
        message: String,
    },

    #[error("Download of '{url}' failed: {message}")]
    Download { url: String, message: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unrecognized PHP version output: {0}")]
    PhpVersion(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Restart,
    Stop,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Restart => "restart",
            ServiceAction::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemCommand {
    InstallPackages(Vec<String>),
    /// Fetch a host-supplied resource and extract it into `dest`.
    FetchResource { name: String, dest: PathBuf },
    /// Download a bzip2 tarball over the network and extract it into `dest`.
    DownloadPayload { url: String, dest: PathBuf },
    Service { action: ServiceAction, unit: String },
    DaemonReload,
    OpenPort(u16),
    /// Recursive ownership change.
    Chown { paths: Vec<PathBuf>, owner: String },
    Chmod { path: PathBuf, mode: u32 },
    EnableApacheModules(Vec<String>),
    DisableApacheSite(String),
    EnableApacheSite(String),
    PhpVersion,
    EnablePhpModule(String),
    InstallCrontab { user: String, line: String },
}

impl fmt::Display for SystemCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemCommand::InstallPackages(p) => write!(f, "apt install {}", p.join(" ")),
            SystemCommand::FetchResource { name, dest } => {
                write!(f, "resource-get {} -> {}", name, dest.display())
            }
            SystemCommand::DownloadPayload { url, dest } => {
                write!(f, "download {} -> {}", redact_url(url), dest.display())
            }
            SystemCommand::Service { action, unit } => {
                write!(f, "systemctl {} {}", action.as_str(), unit)
            }
            SystemCommand::DaemonReload => f.write_str("systemctl daemon-reload"),
            SystemCommand::OpenPort(port) => write!(f, "open-port {}/tcp", port),
            SystemCommand::Chown { paths, owner } => {
                let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
                write!(f, "chown -R {}:{} {}", owner, owner, paths.join(" "))
            }
            SystemCommand::Chmod { path, mode } => write!(f, "chmod {:o} {}", mode, path.display()),
            SystemCommand::EnableApacheModules(m) => write!(f, "a2enmod {}", m.join(" ")),
            SystemCommand::DisableApacheSite(s) => write!(f, "a2dissite {}", s),
            SystemCommand::EnableApacheSite(s) => write!(f, "a2ensite {}", s),
            SystemCommand::PhpVersion => f.write_str("php -v"),
            SystemCommand::EnablePhpModule(m) => write!(f, "phpenmod {}", m),
            SystemCommand::InstallCrontab { user, line } => {
                write!(f, "crontab -u {} <<< '{}'", user, line)
            }
        }
    }
}

/// Local operating-system effects of one unit.
///
/// Like [`crate::occ::RemoteConfigCli`], implementors provide `execute`
/// and get the typed operations for free.
pub trait UnitSystem {
    fn execute(&self, command: &SystemCommand) -> Result<CommandOutput, SystemError>;

    fn run_checked(&self, command: SystemCommand) -> Result<CommandOutput, SystemError> {
        let output = self.execute(&command)?;
        if output.success() {
            Ok(output)
        } else {
            Err(SystemError::Failed {
                command: command.to_string(),
                code: output.code,
                message: output.text(),
            })
        }
    }

    fn install_dependencies(&self) -> Result<CommandOutput, SystemError> {
        self.run_checked(SystemCommand::InstallPackages(
            DEPENDENCIES.iter().map(|p| p.to_string()).collect(),
        ))
    }

    fn fetch_resource(&self, name: &str, dest: PathBuf) -> Result<CommandOutput, SystemError> {
        self.run_checked(SystemCommand::FetchResource {
            name: name.to_string(),
            dest,
        })
    }

    fn download_payload(&self, url: &str, dest: PathBuf) -> Result<CommandOutput, SystemError> {
        self.run_checked(SystemCommand::DownloadPayload {
            url: url.to_string(),
            dest,
        })
    }

    fn service(&self, action: ServiceAction, unit: &str) -> Result<CommandOutput, SystemError> {
        self.run_checked(SystemCommand::Service {
            action,
            unit: unit.to_string(),
        })
    }

    fn daemon_reload(&self) -> Result<CommandOutput, SystemError> {
        self.run_checked(SystemCommand::DaemonReload)
    }

    fn open_port(&self, port: u16) -> Result<CommandOutput, SystemError> {
        self.run_checked(SystemCommand::OpenPort(port))
    }

    fn chown(&self, paths: Vec<PathBuf>, owner: &str) -> Result<CommandOutput, SystemError> {
        self.run_checked(SystemCommand::Chown {
            paths,
            owner: owner.to_string(),
        })
    }

    fn chmod(&self, path: PathBuf, mode: u32) -> Result<CommandOutput, SystemError> {
        self.run_checked(SystemCommand::Chmod { path, mode })
    }

    /// Enables the required apache modules, then swaps the default site for
    /// `site`. Module enablement is best effort: a module may be built in.
    fn enable_apache_site(&self, site: &str) -> Result<(), SystemError> {
        let modules = SystemCommand::EnableApacheModules(
            APACHE_MODULES.iter().map(|m| m.to_string()).collect(),
        );
        let output = self.execute(&modules)?;
        if !output.success() {
            log::warn!("'{}' failed: {}", modules, output.text());
        }

        self.run_checked(SystemCommand::DisableApacheSite("000-default".to_string()))?;
        self.run_checked(SystemCommand::EnableApacheSite(site.to_string()))?;
        Ok(())
    }

    /// The installed PHP version as `major.minor`.
    fn php_version(&self) -> Result<String, SystemError> {
        let output = self.run_checked(SystemCommand::PhpVersion)?;
        parse_php_version(&output.stdout)
    }

    fn enable_php_module(&self, module: &str) -> Result<CommandOutput, SystemError> {
        self.run_checked(SystemCommand::EnablePhpModule(module.to_string()))
    }

    fn install_crontab(&self, user: &str, line: &str) -> Result<CommandOutput, SystemError> {
        self.run_checked(SystemCommand::InstallCrontab {
            user: user.to_string(),
            line: line.to_string(),
        })
    }
}

/// Parses the first line of `php -v`, e.g. `PHP 8.1.2-1ubuntu2.14 (cli) ...`.
pub fn parse_php_version(stdout: &str) -> Result<String, SystemError> {
    let pattern =
        Regex::new(r"^PHP (\d+\.\d+)").map_err(|e| SystemError::PhpVersion(e.to_string()))?;
    let first_line = stdout.lines().next().unwrap_or("");

    pattern
        .captures(first_line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| SystemError::PhpVersion(first_line.to_string()))
}

use std::path::{Path, PathBuf};

use super::{CliError, OccCommand, RemoteConfigCli};
use crate::command::{self, CommandOutput};

/// Runs occ as the web user from the Nextcloud root:
/// `sudo -u www-data php occ <args>`.
pub struct OccShell {
    nextcloud_root: PathBuf,
    web_user: String,
}

impl OccShell {
    pub fn new(nextcloud_root: impl Into<PathBuf>, web_user: impl Into<String>) -> Self {
        Self {
            nextcloud_root: nextcloud_root.into(),
            web_user: web_user.into(),
        }
    }

    pub fn nextcloud_root(&self) -> &Path {
        &self.nextcloud_root
    }

    fn argv(&self, command: &OccCommand) -> Vec<String> {
        let mut argv = vec![
            "-u".to_string(),
            self.web_user.clone(),
            "php".to_string(),
            "occ".to_string(),
        ];
        argv.extend(command.args().iter().cloned());
        argv
    }
}

impl RemoteConfigCli for OccShell {
    fn execute(&self, command: &OccCommand) -> Result<CommandOutput, CliError> {
        log::debug!("Running occ {}", command.redacted());

        let output = command::run("sudo", &self.argv(command), Some(&self.nextcloud_root))
            .map_err(|source| CliError::Spawn {
                program: "sudo".to_string(),
                source,
            })?;

        if !output.success() {
            log::warn!(
                "occ {} exited with code {}: {}",
                command.redacted(),
                output.code,
                output.text()
            );
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argv_runs_as_web_user() {
        let shell = OccShell::new("/var/www/nextcloud", "www-data");
        let argv = shell.argv(&OccCommand::new(["status", "--output=json"]));
        assert_eq!(
            argv,
            vec!["-u", "www-data", "php", "occ", "status", "--output=json"]
        );
        assert_eq!(shell.nextcloud_root(), Path::new("/var/www/nextcloud"));
    }
}

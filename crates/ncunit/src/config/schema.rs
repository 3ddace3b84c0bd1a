use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

/// Operator-facing configuration of one Nextcloud unit.
///
/// Option names follow the host's configuration keys, hence the mix of
/// kebab-case and snake_case renames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConfig {
    #[serde(default)]
    pub fqdn: String,
    #[serde(default = "default_protocol")]
    pub overwriteprotocol: String,
    #[serde(rename = "overwrite-cli-url", default)]
    pub overwrite_cli_url: String,
    #[serde(rename = "default-phone-region", default)]
    pub default_phone_region: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(flatten)]
    pub php: PhpSettings,
    #[serde(rename = "nextcloud-tarfile", default = "default_tarfile")]
    pub nextcloud_tarfile: String,
    #[serde(flatten)]
    pub backup: BackupSettings,
    #[serde(default)]
    pub controller: ControllerSettings,
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_tarfile() -> String {
    "https://download.nextcloud.com/server/releases/latest.tar.bz2".to_string()
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            fqdn: String::new(),
            overwriteprotocol: default_protocol(),
            overwrite_cli_url: String::new(),
            default_phone_region: String::new(),
            debug: false,
            php: PhpSettings::default(),
            nextcloud_tarfile: default_tarfile(),
            backup: BackupSettings::default(),
            controller: ControllerSettings::default(),
        }
    }
}

impl UnitConfig {
    pub fn overwrite_protocol(&self) -> Result<OverwriteProtocol, ConfigError> {
        OverwriteProtocol::parse(&self.overwriteprotocol)
    }

    /// The configured FQDN, if any.
    pub fn fqdn(&self) -> Option<&str> {
        let fqdn = self.fqdn.trim();
        (!fqdn.is_empty()).then_some(fqdn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwriteProtocol {
    Http,
    Https,
}

impl OverwriteProtocol {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim() {
            "http" => Ok(OverwriteProtocol::Http),
            "https" => Ok(OverwriteProtocol::Https),
            other => Err(ConfigError::InvalidProtocol(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverwriteProtocol::Http => "http",
            OverwriteProtocol::Https => "https",
        }
    }
}

impl fmt::Display for OverwriteProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PHP module tuning knobs rendered into `nextcloud.ini`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhpSettings {
    #[serde(rename = "php_max_file_uploads", default = "default_max_file_uploads")]
    pub max_file_uploads: u32,
    #[serde(rename = "php_upload_max_filesize", default = "default_size")]
    pub upload_max_filesize: String,
    #[serde(rename = "php_post_max_size", default = "default_size")]
    pub post_max_size: String,
    #[serde(rename = "php_memory_limit", default = "default_size")]
    pub memory_limit: String,
}

fn default_max_file_uploads() -> u32 {
    20
}

fn default_size() -> String {
    "512M".to_string()
}

impl Default for PhpSettings {
    fn default() -> Self {
        Self {
            max_file_uploads: default_max_file_uploads(),
            upload_max_filesize: default_size(),
            post_max_size: default_size(),
            memory_limit: default_size(),
        }
    }
}

/// Scheduled backups to a remote host over ssh. Disabled while
/// `backup-host` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSettings {
    #[serde(rename = "backup-host", default)]
    pub host: String,
    #[serde(rename = "backup-port", default = "default_backup_port")]
    pub port: u16,
    #[serde(rename = "backup-user", default = "default_backup_user")]
    pub user: String,
    #[serde(rename = "backup-slack-webhook", default)]
    pub slack_webhook: String,
    #[serde(rename = "backup-pagerduty-serviceid", default)]
    pub pagerduty_service_id: String,
    #[serde(rename = "backup-pagerduty-token", default)]
    pub pagerduty_token: String,
    #[serde(rename = "backup-pagerduty-email", default)]
    pub pagerduty_email: String,
}

fn default_backup_port() -> u16 {
    22
}

fn default_backup_user() -> String {
    "root".to_string()
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_backup_port(),
            user: default_backup_user(),
            slack_webhook: String::new(),
            pagerduty_service_id: String::new(),
            pagerduty_token: String::new(),
            pagerduty_email: String::new(),
        }
    }
}

impl BackupSettings {
    pub fn host(&self) -> Option<&str> {
        let host = self.host.trim();
        (!host.is_empty()).then_some(host)
    }

    /// PagerDuty alerts need all three settings.
    pub fn pagerduty_enabled(&self) -> bool {
        [
            &self.pagerduty_service_id,
            &self.pagerduty_token,
            &self.pagerduty_email,
        ]
        .iter()
        .all(|v| !v.trim().is_empty())
    }
}

/// Timing and naming knobs of the controller itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Status polls performed by `Start` before deferring.
    #[serde(default = "default_start_attempts")]
    pub start_attempts: u32,
    #[serde(default = "default_start_retry_delay_ms")]
    pub start_retry_delay_ms: u64,
    /// Pause after a service restart before status is evaluated.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_web_user")]
    pub web_user: String,
}

fn default_start_attempts() -> u32 {
    3
}

fn default_start_retry_delay_ms() -> u64 {
    5_000
}

fn default_settle_delay_ms() -> u64 {
    3_000
}

fn default_service() -> String {
    "apache2.service".to_string()
}

fn default_http_port() -> u16 {
    80
}

fn default_web_user() -> String {
    "www-data".to_string()
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            start_attempts: default_start_attempts(),
            start_retry_delay_ms: default_start_retry_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            service: default_service(),
            http_port: default_http_port(),
            web_user: default_web_user(),
        }
    }
}

impl ControllerSettings {
    pub fn start_retry_delay(&self) -> Duration {
        Duration::from_millis(self.start_retry_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Settings with all delays zeroed, for tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            start_retry_delay_ms: 0,
            settle_delay_ms: 0,
            ..Self::default()
        }
    }
}

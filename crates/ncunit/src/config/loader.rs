use std::path::Path;

use crate::config::region::is_valid_region;
use crate::config::schema::{BackupSettings, UnitConfig};
use crate::error::ConfigError;

/// Loads the unit configuration from a YAML (or JSON) file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<UnitConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<UnitConfig, ConfigError> {
    // An empty options file means "all defaults".
    let config: UnitConfig = if content.trim().is_empty() {
        UnitConfig::default()
    } else {
        serde_yaml::from_str(content)?
    };

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &UnitConfig) -> Result<(), ConfigError> {
    config.overwrite_protocol()?;

    let region = config.default_phone_region.trim();
    if !region.is_empty() && !is_valid_region(region) {
        return Err(ConfigError::InvalidPhoneRegion(region.to_string()));
    }

    let url = config.overwrite_cli_url.trim();
    if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::InvalidCliUrl(url.to_string()));
    }

    if config.php.max_file_uploads == 0 {
        return Err(ConfigError::Validation {
            message: "php_max_file_uploads must be greater than zero".to_string(),
        });
    }

    for (name, value) in [
        ("php_upload_max_filesize", &config.php.upload_max_filesize),
        ("php_post_max_size", &config.php.post_max_size),
        ("php_memory_limit", &config.php.memory_limit),
    ] {
        if !is_php_size(value) {
            return Err(ConfigError::Validation {
                message: format!("{} has invalid size '{}'", name, value),
            });
        }
    }

    validate_backup(&config.backup)?;

    if config.controller.start_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "controller.start_attempts must be at least 1".to_string(),
        });
    }

    if config.controller.service.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "controller.service must not be empty".to_string(),
        });
    }

    Ok(())
}

fn validate_backup(backup: &BackupSettings) -> Result<(), ConfigError> {
    if backup.host().is_none() {
        return Ok(());
    }
    if backup.port == 0 {
        return Err(ConfigError::Validation {
            message: "backup-port must be greater than zero".to_string(),
        });
    }
    if backup.user.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "backup-user must not be empty when backup-host is set".to_string(),
        });
    }

    let webhook = backup.slack_webhook.trim();
    if !webhook.is_empty() && !webhook.starts_with("https://") {
        return Err(ConfigError::Validation {
            message: format!("backup-slack-webhook '{}' must start with https://", webhook),
        });
    }

    let pagerduty = [
        &backup.pagerduty_service_id,
        &backup.pagerduty_token,
        &backup.pagerduty_email,
    ];
    if !backup.pagerduty_enabled() && pagerduty.iter().any(|v| !v.trim().is_empty()) {
        return Err(ConfigError::Validation {
            message: "backup-pagerduty-serviceid, -token and -email must be set together"
                .to_string(),
        });
    }
    Ok(())
}

/// Accepts PHP shorthand sizes: digits with an optional K/M/G suffix, or -1.
fn is_php_size(value: &str) -> bool {
    let value = value.trim();
    if value == "-1" {
        return true;
    }
    let digits = value.trim_end_matches(['K', 'M', 'G', 'k', 'm', 'g']);
    let suffix_len = value.len() - digits.len();
    !digits.is_empty() && suffix_len <= 1 && digits.chars().all(|c| c.is_ascii_digit())
}

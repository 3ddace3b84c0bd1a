//! Rendering of on-disk configuration files from embedded templates.
//!
//! Templates use `{{ name }}` placeholders. Every placeholder must be present
//! in the context; a missing one is an error rather than an empty string, so
//! a half-rendered config never reaches disk.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub type RenderContext = BTreeMap<String, String>;

/// Builds a [`RenderContext`] from literal pairs.
pub fn context<const N: usize>(pairs: [(&str, String); N]) -> RenderContext {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Template '{template}' references unknown variable '{name}'")]
    MissingVariable { template: TemplateId, name: String },

    #[error("Template '{template}' has an unterminated placeholder")]
    Unterminated { template: TemplateId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateId {
    ApacheSite,
    PhpModule,
    CephConfig,
    RedisConfig,
    RedisSession,
    MountUnit,
    BackupScript,
    BackupConf,
    BackupCron,
}

impl TemplateId {
    pub fn file_name(&self) -> &'static str {
        match self {
            TemplateId::ApacheSite => "nextcloud.conf",
            TemplateId::PhpModule => "nextcloud.ini",
            TemplateId::CephConfig => "ceph.config.php",
            TemplateId::RedisConfig => "redis.config.php",
            TemplateId::RedisSession => "redis_session.ini",
            TemplateId::MountUnit => "nextcloud-data.mount",
            TemplateId::BackupScript => "run_backup.sh",
            TemplateId::BackupConf => "NextcloudBackupRestore.conf",
            TemplateId::BackupCron => "nextcloud-backup",
        }
    }

    fn source(&self) -> &'static str {
        match self {
            TemplateId::ApacheSite => include_str!("../templates/nextcloud.conf.tmpl"),
            TemplateId::PhpModule => include_str!("../templates/nextcloud.ini.tmpl"),
            TemplateId::CephConfig => include_str!("../templates/ceph.config.php.tmpl"),
            TemplateId::RedisConfig => include_str!("../templates/redis.config.php.tmpl"),
            TemplateId::RedisSession => include_str!("../templates/redis_session.ini.tmpl"),
            TemplateId::MountUnit => include_str!("../templates/nextcloud-data.mount.tmpl"),
            TemplateId::BackupScript => include_str!("../templates/run_backup.sh.tmpl"),
            TemplateId::BackupConf => include_str!("../templates/NextcloudBackupRestore.conf.tmpl"),
            TemplateId::BackupCron => include_str!("../templates/nextcloud-backup.cron.tmpl"),
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Renders a template with a context mapping.
pub trait ConfigRenderer {
    fn render(&self, template: TemplateId, ctx: &RenderContext) -> Result<String, RenderError>;
}

/// Renderer backed by the templates compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateEngine;

impl TemplateEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ConfigRenderer for TemplateEngine {
    fn render(&self, template: TemplateId, ctx: &RenderContext) -> Result<String, RenderError> {
        substitute(template, template.source(), ctx)
    }
}

fn substitute(template: TemplateId, source: &str, ctx: &RenderContext) -> Result<String, RenderError> {
    let mut result = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or(RenderError::Unterminated { template })?;

        let name = after_open[..end].trim();
        let value = ctx.get(name).ok_or_else(|| RenderError::MissingVariable {
            template,
            name: name.to_string(),
        })?;
        result.push_str(value);

        rest = &after_open[end + 2..];
    }
    result.push_str(rest);

    Ok(result)
}

/// Quotes a value for a POSIX shell assignment. Single quotes inside the
/// value are closed, escaped and reopened.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_replaces_placeholders() {
        let ctx = context([("name", "world".to_string())]);
        let out = substitute(TemplateId::PhpModule, "hello {{ name }} and {{name}}!", &ctx).unwrap();
        assert_eq!(out, "hello world and world!");
    }

    #[test]
    fn test_substitute_missing_variable() {
        let err = substitute(TemplateId::PhpModule, "{{ absent }}", &RenderContext::new()).unwrap_err();
        assert_eq!(
            err,
            RenderError::MissingVariable {
                template: TemplateId::PhpModule,
                name: "absent".to_string()
            }
        );
    }

    #[test]
    fn test_substitute_unterminated() {
        let err = substitute(TemplateId::ApacheSite, "{{ open", &RenderContext::new()).unwrap_err();
        assert!(matches!(err, RenderError::Unterminated { .. }));
    }

    #[test]
    fn test_render_php_module() {
        let ctx = context([
            ("max_file_uploads", "20".to_string()),
            ("upload_max_filesize", "16G".to_string()),
            ("post_max_size", "16G".to_string()),
            ("memory_limit", "512M".to_string()),
        ]);
        let out = TemplateEngine::new().render(TemplateId::PhpModule, &ctx).unwrap();
        assert!(out.contains("upload_max_filesize = 16G"));
        assert!(out.contains("memory_limit = 512M"));
        assert!(!out.contains("{{"));
    }

    #[test]
    fn test_render_ceph_config() {
        let ctx = context([
            ("ceph_key", "AKIA".to_string()),
            ("ceph_secret", "s3cr3t".to_string()),
            ("rados_gw_hostname", "rgw.local".to_string()),
            ("rados_gw_port", "7480".to_string()),
        ]);
        let out = TemplateEngine::new().render(TemplateId::CephConfig, &ctx).unwrap();
        assert!(out.contains("'hostname' => 'rgw.local'"));
        assert!(out.contains("'port' => 7480"));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_render_backup_script_keeps_shell_braces() {
        let ctx = context([
            ("backup_host", shell_quote("backup.example.com")),
            ("backup_port", shell_quote("22")),
            ("backup_user", shell_quote("root")),
            ("backup_conf", shell_quote("/root/backup.conf")),
            ("slack_webhook", shell_quote("")),
            ("pagerduty_service_id", shell_quote("")),
            ("pagerduty_token", shell_quote("")),
            ("pagerduty_email", shell_quote("")),
        ]);
        let out = TemplateEngine::new().render(TemplateId::BackupScript, &ctx).unwrap();
        assert!(out.starts_with("#!/bin/bash"));
        assert!(out.contains("BACKUP_HOST='backup.example.com'"));
        assert!(out.contains("source '/root/backup.conf'"));
        assert!(out.contains("${BACKUP_USER}@${BACKUP_HOST}"));
    }

    #[test]
    fn test_every_template_renders_with_its_variables() {
        let engine = TemplateEngine::new();
        let full = context([
            ("nextcloud_root", "/var/www/nextcloud".to_string()),
            ("max_file_uploads", "20".to_string()),
            ("upload_max_filesize", "1G".to_string()),
            ("post_max_size", "1G".to_string()),
            ("memory_limit", "1G".to_string()),
            ("ceph_key", "k".to_string()),
            ("ceph_secret", "s".to_string()),
            ("rados_gw_hostname", "h".to_string()),
            ("rados_gw_port", "1".to_string()),
            ("redis_hostname", "r".to_string()),
            ("redis_port", "6379".to_string()),
            ("redis_password", "".to_string()),
            ("hostname", "nfs".to_string()),
            ("mountpoint", "/srv".to_string()),
            ("target", "/media/nextcloud/data".to_string()),
            ("fstype", "nfs".to_string()),
            ("options", "defaults".to_string()),
            ("data_dir", "'/srv'".to_string()),
            ("service", "'apache2.service'".to_string()),
            ("web_user", "'www-data'".to_string()),
            ("db_host", "'10.0.0.5'".to_string()),
            ("db_port", "'5432'".to_string()),
            ("db_name", "'nextcloud'".to_string()),
            ("db_user", "'nextcloud'".to_string()),
            ("db_pass", "'secret'".to_string()),
            ("backup_host", "'b'".to_string()),
            ("backup_port", "'22'".to_string()),
            ("backup_user", "'root'".to_string()),
            ("backup_conf", "'/c'".to_string()),
            ("slack_webhook", "''".to_string()),
            ("pagerduty_service_id", "''".to_string()),
            ("pagerduty_token", "''".to_string()),
            ("pagerduty_email", "''".to_string()),
            ("schedule", "0 3 * * *".to_string()),
            ("backup_script", "/s".to_string()),
        ]);
        for id in [
            TemplateId::ApacheSite,
            TemplateId::PhpModule,
            TemplateId::CephConfig,
            TemplateId::RedisConfig,
            TemplateId::RedisSession,
            TemplateId::MountUnit,
            TemplateId::BackupScript,
            TemplateId::BackupConf,
            TemplateId::BackupCron,
        ] {
            assert!(engine.render(id, &full).is_ok(), "template {} failed", id);
        }
    }
}

//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use ncunit::config::{ControllerSettings, UnitConfig};
use ncunit::event::{DatabaseFields, Event, RelationFields};

/// Builder for creating `UnitConfig` instances. Delays are zeroed.
pub struct UnitConfigBuilder {
    config: UnitConfig,
}

impl UnitConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: UnitConfig {
                fqdn: "cloud.example.com".to_string(),
                controller: ControllerSettings::immediate(),
                ..UnitConfig::default()
            },
        }
    }

    pub fn fqdn(mut self, fqdn: &str) -> Self {
        self.config.fqdn = fqdn.to_string();
        self
    }

    pub fn protocol(mut self, protocol: &str) -> Self {
        self.config.overwriteprotocol = protocol.to_string();
        self
    }

    pub fn cli_url(mut self, url: &str) -> Self {
        self.config.overwrite_cli_url = url.to_string();
        self
    }

    pub fn phone_region(mut self, region: &str) -> Self {
        self.config.default_phone_region = region.to_string();
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn start_attempts(mut self, attempts: u32) -> Self {
        self.config.controller.start_attempts = attempts;
        self
    }

    pub fn backup_host(mut self, host: &str) -> Self {
        self.config.backup.host = host.to_string();
        self
    }

    pub fn pagerduty(mut self, service_id: &str, token: &str, email: &str) -> Self {
        self.config.backup.pagerduty_service_id = service_id.to_string();
        self.config.backup.pagerduty_token = token.to_string();
        self.config.backup.pagerduty_email = email.to_string();
        self
    }

    pub fn build(self) -> UnitConfig {
        self.config
    }
}

impl Default for UnitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A complete database relation.
pub fn database_fields() -> DatabaseFields {
    DatabaseFields {
        host: "10.0.0.5".to_string(),
        port: "5432".to_string(),
        user: "nextcloud".to_string(),
        password: "dbsecret".to_string(),
        name: "nextcloud".to_string(),
        version: "14.9".to_string(),
    }
}

pub fn database_created() -> Event {
    Event::DatabaseCreated(database_fields())
}

pub fn fields(pairs: &[(&str, &str)]) -> RelationFields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn ceph_fields() -> RelationFields {
    fields(&[
        (
            "ceph_user",
            r#"{"user_id":"nextcloud","keys":[{"user":"nextcloud","access_key":"AKIA123","secret_key":"s3cr3t"}]}"#,
        ),
        ("rados_gw_hostname", "rgw.example.com"),
        ("rados_gw_port", "7480"),
    ])
}

pub fn redis_fields() -> RelationFields {
    fields(&[("hostname", "10.0.0.30"), ("port", "6379")])
}

pub fn mount_fields() -> RelationFields {
    fields(&[
        ("hostname", "nfs.example.com"),
        ("mountpoint", "/srv/nextcloud"),
        ("fstype", "nfs4"),
    ])
}

//! Table-driven tests for configuration loading and validation.

mod common;

use common::*;

use ncunit::config::{load_config, load_config_from_str, OverwriteProtocol};
use ncunit::error::ConfigError;
use ncunit::event::Event;
use ncunit::role::{Role, RoleContext};
use tempfile::TempDir;

/// Represents a single config loading test case.
struct ConfigTestCase {
    /// Test case name for identification.
    name: &'static str,
    /// The options YAML to load.
    config_yaml: &'static str,
    /// Whether loading should succeed.
    should_succeed: bool,
    /// Expected error substring (if should_succeed is false).
    expected_error: Option<&'static str>,
}

const CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "empty_means_defaults",
        config_yaml: "",
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        config_yaml: r#"
fqdn: cloud.example.com
overwriteprotocol: https
overwrite-cli-url: https://cloud.example.com
default-phone-region: CH
debug: true
php_max_file_uploads: 50
php_upload_max_filesize: 1G
php_post_max_size: 1G
php_memory_limit: "-1"
nextcloud-tarfile: https://download.nextcloud.com/server/releases/nextcloud-27.1.3.tar.bz2
controller:
  start_attempts: 5
  service: httpd.service
"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "invalid_protocol",
        config_yaml: "overwriteprotocol: ftp\n",
        should_succeed: false,
        expected_error: Some("overwriteprotocol 'ftp'"),
    },
    ConfigTestCase {
        name: "invalid_phone_region",
        config_yaml: "default-phone-region: XX\n",
        should_succeed: false,
        expected_error: Some("default-phone-region 'XX'"),
    },
    ConfigTestCase {
        name: "invalid_cli_url",
        config_yaml: "overwrite-cli-url: cloud.example.com\n",
        should_succeed: false,
        expected_error: Some("overwrite-cli-url"),
    },
    ConfigTestCase {
        name: "zero_file_uploads",
        config_yaml: "php_max_file_uploads: 0\n",
        should_succeed: false,
        expected_error: Some("php_max_file_uploads"),
    },
    ConfigTestCase {
        name: "invalid_memory_limit",
        config_yaml: "php_memory_limit: lots\n",
        should_succeed: false,
        expected_error: Some("php_memory_limit"),
    },
    ConfigTestCase {
        name: "zero_start_attempts",
        config_yaml: "controller:\n  start_attempts: 0\n",
        should_succeed: false,
        expected_error: Some("start_attempts"),
    },
    ConfigTestCase {
        name: "malformed_yaml",
        config_yaml: "fqdn: [unclosed\n",
        should_succeed: false,
        expected_error: Some("parse"),
    },
];

#[test]
fn test_config_loading() {
    for test_case in CONFIG_TESTS {
        let result = load_config_from_str(test_case.config_yaml);

        if test_case.should_succeed {
            assert!(
                result.is_ok(),
                "Test '{}': Expected success but got error: {:?}",
                test_case.name,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Test '{}': Expected error but got success",
                test_case.name
            );

            if let Some(expected_error) = test_case.expected_error {
                let error_msg = result.err().unwrap().to_string();
                assert!(
                    error_msg.contains(expected_error),
                    "Test '{}': Expected error containing '{}', got '{}'",
                    test_case.name,
                    expected_error,
                    error_msg
                );
            }
        }
    }
}

#[test]
fn test_load_config_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    std::fs::write(
        &path,
        "fqdn: cloud.example.com\noverwriteprotocol: https\ncontroller:\n  http_port: 8080\n",
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.fqdn(), Some("cloud.example.com"));
    assert_eq!(config.overwrite_protocol().unwrap(), OverwriteProtocol::Https);
    assert_eq!(config.controller.http_port, 8080);
    assert_eq!(config.controller.start_attempts, 3);
    assert_eq!(config.php.memory_limit, "512M");
}

#[test]
fn test_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let result = load_config(temp_dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
}

#[test]
fn test_loaded_settings_reach_the_application() {
    let mut config = load_config_from_str(
        "fqdn: cloud.example.com\noverwriteprotocol: https\ndefault-phone-region: DE\noverwrite-cli-url: https://cloud.example.com\n",
    )
    .unwrap();
    config.controller = UnitConfigBuilder::new().build().controller;

    let node = TestNode::with_config(
        RoleContext::new(Role::Leader, "nextcloud/0", "10.0.0.10"),
        config,
    );
    node.handle_alone(&database_created());
    node.write_config_php("<?php\n$CONFIG = array ();\n");
    node.handle_alone(&Event::ConfigChanged);

    assert!(node.occ.ran("config:system:set overwriteprotocol --value=https"));
    assert!(node.occ.ran("config:system:set default_phone_region --value=DE"));
    assert!(node
        .occ
        .ran("config:system:set overwrite.cli.url --value=https://cloud.example.com"));
}

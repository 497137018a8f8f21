// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Courier configuration system.

use courier_config::diagnostic::ConfigError;
use courier_config::model::CourierConfig;
use courier_config::{load_and_validate_str, load_config_from_path, load_config_from_str};
use figment::Jail;
use serial_test::serial;

/// Valid TOML with all sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_courier_config() {
    let toml = r#"
[daemon]
log_level = "debug"

[storage]
database_path = "/tmp/courier.db"
busy_timeout_ms = 1000

[scheduler]
interval_secs = 30
batch_size = 50
max_in_flight_campaigns = 4
status_check_offsets_secs = [60, 120, 600, 3600]

[status_worker]
interval_secs = 120
page_size = 10
job_timeout_secs = 5
max_retries = 2

[tracking]
counter_name = "test_counter"
hex_width = 8

[bot]
api_domain = "http://localhost:8080"
username = "scheduler"
password = "secret"

[sms]
base_url = "http://localhost:9090"
system_name = "courier"
username = "sms-user"
password = "sms-pass"
utc_offset_minutes = 0

[admin]
mobile = "09120000000"
sender = "3000"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.daemon.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/courier.db");
    assert_eq!(config.scheduler.batch_size, 50);
    assert_eq!(config.scheduler.max_in_flight_campaigns, Some(4));
    assert_eq!(config.scheduler.status_check_offsets_secs, vec![60, 120, 600, 3_600]);
    assert_eq!(config.status_worker.max_retries, 2);
    assert_eq!(config.tracking.hex_width, 8);
    assert_eq!(config.bot.username.as_deref(), Some("scheduler"));
    assert_eq!(config.sms.password.as_deref(), Some("sms-pass"));
    assert_eq!(config.admin.mobile.as_deref(), Some("09120000000"));
}

/// Empty TOML yields the documented defaults.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty config should load");
    assert_eq!(config.scheduler.interval_secs, 60);
    assert_eq!(config.scheduler.batch_size, 100);
    assert_eq!(
        config.scheduler.status_check_offsets_secs,
        vec![300, 900, 3_600, 180_000]
    );
    assert_eq!(config.scheduler.link_placeholder, "\u{1F517}");
    assert_eq!(config.status_worker.interval_secs, 300);
    assert_eq!(config.status_worker.page_size, 100);
    assert_eq!(config.status_worker.job_timeout_secs, 30);
    assert_eq!(config.tracking.counter_name, "sms_tracking_id");
    assert_eq!(config.tracking.hex_width, 16);
    assert_eq!(config.bot.api_domain, "https://jazebeh.ir");
    assert_eq!(config.bot.timeout_secs, 30);
    assert_eq!(config.sms.timeout_secs, 60);
    assert_eq!(config.sms.scope, "webservice");
    assert_eq!(config.sms.grant_type, "password");
    assert_eq!(config.sms.utc_offset_minutes, 210);
    assert!(config.admin.mobile.is_none());
}

#[test]
fn unknown_key_gets_a_suggestion() {
    let toml = r#"
[scheduler]
bach_size = 10
"#;

    let errors = load_and_validate_str(toml).expect_err("unknown key should fail");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::UnknownKey { key, suggestion, .. }
            if key == "bach_size" && suggestion.as_deref() == Some("batch_size")
    )));
}

#[test]
fn wrong_type_is_reported_with_key_path() {
    let toml = r#"
[status_worker]
page_size = "many"
"#;

    let errors = load_and_validate_str(toml).expect_err("wrong type should fail");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::InvalidType { key, .. } if key.contains("page_size")
    )));
}

#[test]
fn batch_size_must_stay_below_provider_ceiling() {
    let toml = r#"
[scheduler]
batch_size = 250
"#;

    let errors = load_and_validate_str(toml).expect_err("batch size 250 should fail");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::Validation { message } if message.contains("batch_size")
    )));

    assert!(load_and_validate_str("[scheduler]\nbatch_size = 249\n").is_ok());
}

#[test]
fn default_struct_matches_empty_file() {
    let from_file = load_config_from_str("").unwrap();
    let from_default = CourierConfig::default();
    assert_eq!(
        from_file.scheduler.opt_out_suffix,
        from_default.scheduler.opt_out_suffix
    );
    assert_eq!(from_file.storage.database_path, from_default.storage.database_path);
}

/// Env vars override file values using the explicit section mapping.
#[test]
#[serial]
fn env_overrides_file_values() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "courier.toml",
            r#"
[scheduler]
batch_size = 20

[status_worker]
page_size = 7
"#,
        )?;
        jail.set_env("COURIER_SCHEDULER_BATCH_SIZE", "40");
        jail.set_env("COURIER_STATUS_WORKER_PAGE_SIZE", "9");
        jail.set_env("COURIER_SMS_ROOT_ACCESS_TOKEN", "cm9vdA==");

        let config = load_config_from_path(std::path::Path::new("courier.toml"))?;
        assert_eq!(config.scheduler.batch_size, 40);
        assert_eq!(config.status_worker.page_size, 9);
        assert_eq!(config.sms.root_access_token.as_deref(), Some("cm9vdA=="));
        Ok(())
    });
}

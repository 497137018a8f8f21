// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier campaign scheduler.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Process-level settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Campaign reconciliation loop and processor settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Delivery-status reconciliation worker settings.
    #[serde(default)]
    pub status_worker: StatusWorkerConfig,

    /// Tracking-ID counter settings.
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Control-plane (bot API) client settings.
    #[serde(default)]
    pub bot: BotConfig,

    /// SMS provider client settings.
    #[serde(default)]
    pub sms: SmsConfig,

    /// Operator alerting settings.
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Milliseconds a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("courier").join("courier.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("courier.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Reconciliation loop and per-campaign processor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Seconds between reconciliation ticks.
    #[serde(default = "default_scheduler_interval_secs")]
    pub interval_secs: u64,

    /// Recipients per provider request. Must stay below the provider's 250 ceiling.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Upper bound on concurrently processing campaigns. Unbounded when unset.
    #[serde(default)]
    pub max_in_flight_campaigns: Option<usize>,

    /// Seconds to wait for in-flight campaigns on shutdown.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,

    /// Domain prefix placed before each short-link code in message bodies.
    #[serde(default = "default_short_link_domain")]
    pub short_link_domain: String,

    /// Token in campaign content replaced by the recipient's short link.
    #[serde(default = "default_link_placeholder")]
    pub link_placeholder: String,

    /// Text appended to every message body.
    #[serde(default = "default_opt_out_suffix")]
    pub opt_out_suffix: String,

    /// Offsets, in seconds after a send, at which delivery status is rechecked.
    #[serde(default = "default_status_check_offsets_secs")]
    pub status_check_offsets_secs: Vec<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_scheduler_interval_secs(),
            batch_size: default_batch_size(),
            max_in_flight_campaigns: None,
            drain_timeout_secs: default_drain_timeout_secs(),
            short_link_domain: default_short_link_domain(),
            link_placeholder: default_link_placeholder(),
            opt_out_suffix: default_opt_out_suffix(),
            status_check_offsets_secs: default_status_check_offsets_secs(),
        }
    }
}

fn default_scheduler_interval_secs() -> u64 {
    60
}

fn default_batch_size() -> usize {
    100
}

fn default_drain_timeout_secs() -> u64 {
    30
}

fn default_short_link_domain() -> String {
    "jo1n.ir/".to_string()
}

fn default_link_placeholder() -> String {
    "\u{1F517}".to_string()
}

fn default_opt_out_suffix() -> String {
    "\nلغو۱۱".to_string()
}

fn default_status_check_offsets_secs() -> Vec<u64> {
    // 5m, 15m, 1h, 50h
    vec![300, 900, 3_600, 180_000]
}

/// Delivery-status worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StatusWorkerConfig {
    /// Seconds between status passes.
    #[serde(default = "default_status_interval_secs")]
    pub interval_secs: u64,

    /// Maximum due jobs handled per pass.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Per-job timeout in seconds.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// Jobs that failed this many times are no longer picked up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for StatusWorkerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_status_interval_secs(),
            page_size: default_page_size(),
            job_timeout_secs: default_job_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_status_interval_secs() -> u64 {
    300
}

fn default_page_size() -> usize {
    100
}

fn default_job_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

/// Tracking-ID counter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TrackingConfig {
    /// Name of the sequence-counter row.
    #[serde(default = "default_counter_name")]
    pub counter_name: String,

    /// Width of issued IDs in hex digits; the key space is `hex_width * 4` bits.
    #[serde(default = "default_hex_width")]
    pub hex_width: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            counter_name: default_counter_name(),
            hex_width: default_hex_width(),
        }
    }
}

fn default_counter_name() -> String {
    "sms_tracking_id".to_string()
}

fn default_hex_width() -> usize {
    16
}

/// Control-plane client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Base URL of the control-plane API.
    #[serde(default = "default_api_domain")]
    pub api_domain: String,

    /// Bot account username.
    #[serde(default)]
    pub username: Option<String>,

    /// Bot account password.
    #[serde(default)]
    pub password: Option<String>,

    /// HTTP timeout in seconds.
    #[serde(default = "default_bot_timeout_secs")]
    pub timeout_secs: u64,

    /// Domain sent along with short-link allocation requests.
    #[serde(default = "default_allocation_domain")]
    pub short_link_domain: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_domain: default_api_domain(),
            username: None,
            password: None,
            timeout_secs: default_bot_timeout_secs(),
            short_link_domain: default_allocation_domain(),
        }
    }
}

fn default_api_domain() -> String {
    "https://jazebeh.ir".to_string()
}

fn default_bot_timeout_secs() -> u64 {
    30
}

fn default_allocation_domain() -> String {
    "https://jo1n.ir/".to_string()
}

/// SMS provider client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SmsConfig {
    /// Base URL for the send and status endpoints.
    #[serde(default = "default_sms_base_url")]
    pub base_url: String,

    /// OAuth token endpoint. Derived from `base_url` when unset.
    #[serde(default)]
    pub token_url: Option<String>,

    #[serde(default)]
    pub system_name: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_scope")]
    pub scope: String,

    #[serde(default = "default_grant_type")]
    pub grant_type: String,

    /// Sent as `Authorization: Basic <token>` on token requests when set.
    #[serde(default)]
    pub root_access_token: Option<String>,

    /// HTTP timeout in seconds.
    #[serde(default = "default_sms_timeout_secs")]
    pub timeout_secs: u64,

    /// Seconds added to the provider-local send date.
    #[serde(default = "default_send_delay_secs")]
    pub send_delay_secs: i64,

    /// Provider-local UTC offset in minutes (Tehran is +210).
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            base_url: default_sms_base_url(),
            token_url: None,
            system_name: String::new(),
            username: String::new(),
            password: None,
            scope: default_scope(),
            grant_type: default_grant_type(),
            root_access_token: None,
            timeout_secs: default_sms_timeout_secs(),
            send_delay_secs: default_send_delay_secs(),
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

fn default_sms_base_url() -> String {
    "https://www.payamsms.com".to_string()
}

fn default_scope() -> String {
    "webservice".to_string()
}

fn default_grant_type() -> String {
    "password".to_string()
}

fn default_sms_timeout_secs() -> u64 {
    60
}

fn default_send_delay_secs() -> i64 {
    60
}

fn default_utc_offset_minutes() -> i32 {
    210
}

/// Operator alerting configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AdminConfig {
    /// Mobile number that receives failure alerts. Alerts are dropped when unset.
    #[serde(default)]
    pub mobile: Option<String>,

    /// Sender line used for alerts.
    #[serde(default)]
    pub sender: Option<String>,
}

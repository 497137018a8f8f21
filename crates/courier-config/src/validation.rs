// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

/// Hard per-request recipient ceiling of the SMS provider.
pub const PROVIDER_BATCH_CEILING: usize = 250;

/// Status checks scheduled per sent batch.
pub const STATUS_CHECKS_PER_BATCH: usize = 4;

/// Latest allowed status check, in seconds after a send (30 days).
pub const MAX_STATUS_CHECK_OFFSET_SECS: u64 = 30 * 24 * 3_600;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or every collected error
/// (does not fail fast).
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let scheduler = &config.scheduler;
    if scheduler.interval_secs == 0 {
        fail("scheduler.interval_secs must be greater than 0".to_string());
    }
    if scheduler.batch_size == 0 || scheduler.batch_size >= PROVIDER_BATCH_CEILING {
        fail(format!(
            "scheduler.batch_size must be between 1 and {}, got {}",
            PROVIDER_BATCH_CEILING - 1,
            scheduler.batch_size
        ));
    }
    if scheduler.max_in_flight_campaigns == Some(0) {
        fail("scheduler.max_in_flight_campaigns must be greater than 0 when set".to_string());
    }
    let offsets = &scheduler.status_check_offsets_secs;
    if offsets.len() != STATUS_CHECKS_PER_BATCH {
        fail(format!(
            "scheduler.status_check_offsets_secs must list {} offsets, got {}",
            STATUS_CHECKS_PER_BATCH,
            offsets.len()
        ));
    }
    if offsets.windows(2).any(|pair| pair[0] >= pair[1]) {
        fail("scheduler.status_check_offsets_secs must be strictly increasing".to_string());
    }
    if offsets.iter().any(|secs| *secs > MAX_STATUS_CHECK_OFFSET_SECS) {
        fail(format!(
            "scheduler.status_check_offsets_secs must not exceed {MAX_STATUS_CHECK_OFFSET_SECS}"
        ));
    }
    if scheduler.link_placeholder.is_empty() {
        fail("scheduler.link_placeholder must not be empty".to_string());
    }

    let worker = &config.status_worker;
    if worker.interval_secs == 0 {
        fail("status_worker.interval_secs must be greater than 0".to_string());
    }
    if worker.page_size == 0 {
        fail("status_worker.page_size must be greater than 0".to_string());
    }
    if worker.job_timeout_secs == 0 {
        fail("status_worker.job_timeout_secs must be greater than 0".to_string());
    }
    if worker.max_retries == 0 {
        fail("status_worker.max_retries must be greater than 0".to_string());
    }

    let tracking = &config.tracking;
    if tracking.counter_name.trim().is_empty() {
        fail("tracking.counter_name must not be empty".to_string());
    }
    if !(1..=16).contains(&tracking.hex_width) {
        fail(format!(
            "tracking.hex_width must be between 1 and 16, got {}",
            tracking.hex_width
        ));
    }

    for (key, url) in [
        ("bot.api_domain", config.bot.api_domain.as_str()),
        ("sms.base_url", config.sms.base_url.as_str()),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            fail(format!("{key} must be an http(s) URL, got `{url}`"));
        }
    }
    if let Some(url) = &config.sms.token_url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        fail(format!("sms.token_url must be an http(s) URL, got `{url}`"));
    }
    if !(-720..=840).contains(&config.sms.utc_offset_minutes) {
        fail(format!(
            "sms.utc_offset_minutes must be between -720 and 840, got {}",
            config.sms.utc_offset_minutes
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier check-config` command implementation.
//!
//! The configuration has already loaded and validated by the time this runs.
//! These checks cover what validation cannot: credentials the daemon needs
//! at runtime, alert routing, and whether the database opens.

use std::time::{Duration, Instant};

use courier_config::model::CourierConfig;
use courier_core::CourierError;

use crate::serve::open_database;

/// Status of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(
        name: &'static str,
        status: CheckStatus,
        message: impl Into<String>,
        start: Instant,
    ) -> Self {
        Self {
            name,
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `courier check-config` command. Fails if any check fails.
pub async fn run_check_config(config: &CourierConfig) -> Result<(), CourierError> {
    let results = vec![
        CheckResult::new("Config", CheckStatus::Pass, "loaded and validated", Instant::now()),
        check_bot_credentials(config),
        check_sms_credentials(config),
        check_admin_alerts(config),
        check_database(config).await,
    ];

    println!();
    println!("  courier check-config");
    println!("  {}", "-".repeat(50));
    for result in &results {
        let symbol = match result.status {
            CheckStatus::Pass => "OK  ",
            CheckStatus::Warn => "WARN",
            CheckStatus::Fail => "FAIL",
        };
        println!(
            "  [{symbol}] {:<16} {} ({}ms)",
            result.name,
            result.message,
            result.duration.as_millis()
        );
    }
    println!();

    let failed: Vec<&str> = results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .map(|r| r.name)
        .collect();
    if failed.is_empty() {
        Ok(())
    } else {
        Err(CourierError::Config(format!(
            "{} check(s) failed: {}",
            failed.len(),
            failed.join(", ")
        )))
    }
}

fn is_set(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

fn check_bot_credentials(config: &CourierConfig) -> CheckResult {
    let start = Instant::now();
    let bot = &config.bot;
    if is_set(bot.username.as_deref()) && is_set(bot.password.as_deref()) {
        CheckResult::new(
            "Control plane",
            CheckStatus::Pass,
            format!("{} as {}", bot.api_domain, bot.username.as_deref().unwrap_or_default()),
            start,
        )
    } else {
        CheckResult::new(
            "Control plane",
            CheckStatus::Fail,
            "bot.username and bot.password are required",
            start,
        )
    }
}

fn check_sms_credentials(config: &CourierConfig) -> CheckResult {
    let start = Instant::now();
    let sms = &config.sms;
    let mut missing = Vec::new();
    if sms.system_name.trim().is_empty() {
        missing.push("sms.system_name");
    }
    if sms.username.trim().is_empty() {
        missing.push("sms.username");
    }
    if !is_set(sms.password.as_deref()) {
        missing.push("sms.password");
    }
    if missing.is_empty() {
        CheckResult::new("SMS provider", CheckStatus::Pass, sms.base_url.clone(), start)
    } else {
        CheckResult::new(
            "SMS provider",
            CheckStatus::Fail,
            format!("missing {}", missing.join(", ")),
            start,
        )
    }
}

fn check_admin_alerts(config: &CourierConfig) -> CheckResult {
    let start = Instant::now();
    let admin = &config.admin;
    match (admin.mobile.as_deref(), admin.sender.as_deref()) {
        (Some(mobile), Some(sender)) if is_set(Some(mobile)) && is_set(Some(sender)) => {
            CheckResult::new(
                "Admin alerts",
                CheckStatus::Pass,
                format!("to {mobile} from line {sender}"),
                start,
            )
        }
        _ => CheckResult::new(
            "Admin alerts",
            CheckStatus::Warn,
            "disabled (set admin.mobile and admin.sender to enable)",
            start,
        ),
    }
}

async fn check_database(config: &CourierConfig) -> CheckResult {
    let start = Instant::now();
    match open_database(config).await {
        Ok(db) => {
            let _ = db.close().await;
            CheckResult::new(
                "Database",
                CheckStatus::Pass,
                format!("{} (migrations applied)", config.storage.database_path),
                start,
            )
        }
        Err(e) => CheckResult::new(
            "Database",
            CheckStatus::Fail,
            format!("open failed: {e}"),
            start,
        ),
    }
}

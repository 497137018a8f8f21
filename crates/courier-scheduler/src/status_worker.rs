// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delayed delivery-status reconciliation.
//!
//! Every pass picks up due status jobs, queries the provider for their
//! tracking IDs, stores the reports, refreshes the campaign aggregate and
//! pushes it to the control plane.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use courier_config::model::StatusWorkerConfig;
use courier_core::{ControlPlane, CourierError, DeliveryReport, SmsGateway, StatusJob};
use courier_storage::queries::status_results::{self, RecordedStatus};
use courier_storage::queries::status_jobs;
use courier_storage::{Database, now_timestamp};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::notify::AdminAlerter;

/// Counters for one status pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusPassReport {
    pub due: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pushed: usize,
}

/// Control-plane session for one pass: login happens at most once.
enum BotSession {
    NotStarted,
    Ready(String),
    Unavailable,
}

/// Attach a tracking ID to each report.
///
/// A report is matched by the tracking ID it carries when that ID belongs to
/// the job; otherwise it takes the job's ID at the same position. Reports
/// that match neither way are dropped.
pub fn align_reports(
    tracking_ids: &[String],
    reports: Vec<DeliveryReport>,
) -> Vec<DeliveryReport> {
    let known: HashSet<&str> = tracking_ids.iter().map(String::as_str).collect();
    reports
        .into_iter()
        .enumerate()
        .filter_map(|(idx, mut report)| {
            if known.contains(report.tracking_id.trim()) {
                report.tracking_id = report.tracking_id.trim().to_string();
                return Some(report);
            }
            let fallback = tracking_ids.get(idx)?;
            report.tracking_id = fallback.clone();
            Some(report)
        })
        .collect()
}

/// The status reconciliation worker.
pub struct StatusWorker {
    db: Database,
    gateway: Arc<dyn SmsGateway>,
    control: Arc<dyn ControlPlane>,
    alerter: AdminAlerter,
    interval: Duration,
    page_size: usize,
    job_timeout: Duration,
    max_retries: u32,
}

impl StatusWorker {
    pub fn new(
        db: Database,
        gateway: Arc<dyn SmsGateway>,
        control: Arc<dyn ControlPlane>,
        alerter: AdminAlerter,
        config: &StatusWorkerConfig,
    ) -> Self {
        Self {
            db,
            gateway,
            control,
            alerter,
            interval: Duration::from_secs(config.interval_secs),
            page_size: config.page_size,
            job_timeout: Duration::from_secs(config.job_timeout_secs),
            max_retries: config.max_retries,
        }
    }

    /// Run passes every interval, starting immediately, until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        info!(interval_secs = self.interval.as_secs(), "status worker started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.run_once().await;
                    if report.due > 0 {
                        info!(
                            due = report.due,
                            succeeded = report.succeeded,
                            failed = report.failed,
                            pushed = report.pushed,
                            "status pass finished"
                        );
                    }
                }
                _ = cancel.cancelled() => {
                    info!("status worker shutting down");
                    break;
                }
            }
        }
    }

    /// Process one page of due jobs.
    ///
    /// Failures to list jobs or to authenticate against either external
    /// system are alerted; per-job failures are only recorded on the job.
    pub async fn run_once(&self) -> StatusPassReport {
        let mut report = StatusPassReport::default();

        let jobs = match status_jobs::list_due(
            &self.db,
            &now_timestamp(),
            self.max_retries,
            self.page_size,
        )
        .await
        {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "listing due status jobs failed");
                let message = format!("Scheduler list due status jobs failed: {e}");
                self.alerter.alert(message);
                return report;
            }
        };
        report.due = jobs.len();
        if jobs.is_empty() {
            return report;
        }

        let token = match self.gateway.get_token().await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "sms provider token request failed");
                let message = format!("Scheduler sms provider token failed: {e}");
                self.alerter.alert(message);
                return report;
            }
        };

        let mut session = BotSession::NotStarted;
        for job in jobs {
            let reports = match self.fetch(&token, &job).await {
                Ok(reports) => reports,
                Err(e) => {
                    report.failed += 1;
                    warn!(job_id = job.id, error = %e, "status job failed");
                    if let Err(e) = status_jobs::mark_failed(&self.db, job.id, &e.to_string()).await
                    {
                        error!(job_id = job.id, error = %e, "failed to record status job failure");
                    }
                    continue;
                }
            };

            let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
            let recorded = match status_results::record_job_results(
                &self.db,
                job.id,
                job.processed_campaign_id,
                reports,
                updated_at,
            )
            .await
            {
                Ok(recorded) => recorded,
                Err(e) => {
                    report.failed += 1;
                    error!(job_id = job.id, error = %e, "failed to store delivery reports");
                    continue;
                }
            };
            report.succeeded += 1;
            debug!(
                job_id = job.id,
                campaign_id = recorded.campaign_id,
                delivered = recorded.statistics.aggregated_total_delivered_parts,
                "status job recorded"
            );

            if self.push(&mut session, &recorded).await {
                report.pushed += 1;
            }
        }
        report
    }

    async fn fetch(
        &self,
        token: &str,
        job: &StatusJob,
    ) -> Result<Vec<DeliveryReport>, CourierError> {
        let reports = tokio::time::timeout(
            self.job_timeout,
            self.gateway.fetch_status(token, &job.tracking_ids),
        )
        .await
        .map_err(|_| CourierError::Timeout {
            duration: self.job_timeout,
        })??;
        Ok(align_reports(&job.tracking_ids, reports))
    }

    async fn push(&self, session: &mut BotSession, recorded: &RecordedStatus) -> bool {
        if matches!(session, BotSession::NotStarted) {
            *session = match self.control.login().await {
                Ok(token) => BotSession::Ready(token),
                Err(e) => {
                    error!(error = %e, "control-plane login failed, statistics not pushed");
                    let message = format!("Scheduler bot login failed during status push: {e}");
                    self.alerter.alert(message);
                    BotSession::Unavailable
                }
            };
        }
        let BotSession::Ready(token) = session else {
            return false;
        };
        match self
            .control
            .push_statistics(token, recorded.campaign_id, &recorded.statistics)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(campaign_id = recorded.campaign_id, error = %e, "statistics push failed");
                false
            }
        }
    }
}

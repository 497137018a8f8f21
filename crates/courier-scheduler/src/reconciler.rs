// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic reconciliation of ready campaigns.
//!
//! Each tick logs in to the control plane, lists ready campaigns, filters out
//! invalid and already-processed ones, and dispatches one task per remaining
//! campaign. Ticks never wait for dispatched tasks; the [`TaskTracker`] only
//! exists so shutdown can drain them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use courier_core::{Campaign, ControlPlane, CourierError};
use courier_storage::Database;
use courier_storage::queries::campaigns;
use dashmap::DashSet;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::notify::AdminAlerter;
use crate::processor::CampaignProcessor;

/// Counters for one reconciliation tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub listed: usize,
    pub invalid: usize,
    pub already_processed: usize,
    pub in_flight: usize,
    pub dispatched: usize,
}

/// Removes a campaign from the in-flight set when its task ends, including
/// by panic.
struct InFlightGuard {
    in_flight: Arc<DashSet<u64>>,
    campaign_id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.campaign_id);
    }
}

/// The reconciliation loop.
pub struct Reconciler {
    db: Database,
    control: Arc<dyn ControlPlane>,
    processor: Arc<CampaignProcessor>,
    alerter: AdminAlerter,
    in_flight: Arc<DashSet<u64>>,
    tracker: TaskTracker,
    limit: Option<Arc<Semaphore>>,
    interval: Duration,
}

impl Reconciler {
    pub fn new(
        db: Database,
        control: Arc<dyn ControlPlane>,
        processor: Arc<CampaignProcessor>,
        alerter: AdminAlerter,
        interval: Duration,
        max_in_flight: Option<usize>,
    ) -> Self {
        Self {
            db,
            control,
            processor,
            alerter,
            in_flight: Arc::new(DashSet::new()),
            tracker: TaskTracker::new(),
            limit: max_in_flight.map(|n| Arc::new(Semaphore::new(n))),
            interval,
        }
    }

    /// Tracker of dispatched campaign tasks.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Number of campaign tasks still running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Run ticks every interval, starting immediately, until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        info!(interval_secs = self.interval.as_secs(), "reconciliation loop started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.tick().await;
                    if report.listed > 0 {
                        info!(
                            listed = report.listed,
                            invalid = report.invalid,
                            already_processed = report.already_processed,
                            in_flight = report.in_flight,
                            dispatched = report.dispatched,
                            "reconciliation tick finished"
                        );
                    }
                }
                _ = cancel.cancelled() => {
                    info!("reconciliation loop shutting down");
                    break;
                }
            }
        }
    }

    /// One reconciliation pass. Never fails; every failure is logged and,
    /// at loop level, alerted.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        let token = match self.control.login().await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "control-plane login failed");
                let message = format!("Scheduler bot login failed: {e}");
                self.alerter.alert(message);
                return report;
            }
        };
        debug!("control-plane login succeeded");

        let ready = match self.control.list_ready_campaigns(&token).await {
            Ok(ready) => ready,
            Err(e) => {
                error!(error = %e, "listing ready campaigns failed");
                let message = format!("Scheduler list ready campaigns failed: {e}");
                self.alerter.alert(message);
                return report;
            }
        };
        report.listed = ready.len();

        let now = Utc::now();
        for campaign in ready {
            if let Err(e) = campaign.validate_ready(now) {
                warn!(campaign_id = campaign.id, error = %e, "campaign not ready, skipping");
                self.alerter.alert(format!(
                    "Scheduler validate campaign failed for id={}: {e}",
                    campaign.id
                ));
                report.invalid += 1;
                continue;
            }

            match campaigns::exists(&self.db, campaign.id).await {
                Ok(true) => {
                    debug!(campaign_id = campaign.id, "campaign already processed, skipping");
                    report.already_processed += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(campaign_id = campaign.id, error = %e, "processed check failed");
                    self.alerter.alert(format!(
                        "Scheduler check processed failed for id={}: {e}",
                        campaign.id
                    ));
                    continue;
                }
            }

            if !self.in_flight.insert(campaign.id) {
                debug!(campaign_id = campaign.id, "campaign still in flight, skipping");
                report.in_flight += 1;
                continue;
            }

            self.dispatch(token.clone(), campaign);
            report.dispatched += 1;
        }
        report
    }

    fn dispatch(&self, token: String, campaign: Campaign) {
        let processor = self.processor.clone();
        let alerter = self.alerter.clone();
        let limit = self.limit.clone();
        let guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
            campaign_id: campaign.id,
        };

        self.tracker.spawn(async move {
            let _guard = guard;
            let _permit = match limit {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };

            match processor.process(&token, &campaign).await {
                Ok(report) => info!(
                    campaign_id = campaign.id,
                    processed_campaign_id = report.processed_campaign_id,
                    recipients = report.recipients,
                    batches_sent = report.batches_sent,
                    "campaign processed"
                ),
                Err(CourierError::AlreadyProcessed { .. }) => {
                    info!(campaign_id = campaign.id, "campaign claimed by another run");
                }
                Err(e) => {
                    error!(campaign_id = campaign.id, error = %e, "campaign processing failed");
                    alerter.alert(format!(
                        "Scheduler process campaign failed for campaign id={}: {e}",
                        campaign.id
                    ));
                }
            }
        });
        debug!("campaign task dispatched");
    }

    /// Wait for every dispatched task to finish, then accept new ones again.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Stop accepting tasks and wait up to `timeout` for in-flight ones.
    /// Returns `false` if the timeout elapsed first.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending == 0 {
            return true;
        }
        info!(pending, "waiting for in-flight campaigns");
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    pending = self.tracker.len(),
                    timeout_secs = timeout.as_secs(),
                    "drain timed out with campaigns still in flight"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::TrackingAllocator;
    use crate::processor::DeliverySettings;
    use courier_core::ProfileColor;
    use courier_test_utils::{ADMIN_MOBILE, ControlPlaneCall, TestHarness, ready_campaign};

    fn reconciler(harness: &TestHarness) -> Reconciler {
        let processor = CampaignProcessor::new(
            harness.db.clone(),
            harness.control.clone(),
            harness.gateway.clone(),
            TrackingAllocator::new(harness.db.clone(), &harness.config.tracking),
            DeliverySettings::from_config(&harness.config.scheduler),
        );
        Reconciler::new(
            harness.db.clone(),
            harness.control.clone(),
            Arc::new(processor),
            AdminAlerter::new(
                harness.config.admin.mobile.clone(),
                Some(harness.notifier.clone()),
            ),
            Duration::from_secs(60),
            harness.config.scheduler.max_in_flight_campaigns,
        )
    }

    async fn seeded(campaigns: Vec<Campaign>) -> TestHarness {
        let harness = TestHarness::builder()
            .with_campaigns(campaigns)
            .build()
            .await
            .unwrap();
        harness.seed_tag(1).await.unwrap();
        harness.seed_profiles(1, ProfileColor::White, 6).await.unwrap();
        harness
    }

    #[tokio::test]
    async fn dispatches_ready_campaigns_and_skips_invalid_ones() {
        let mut future = ready_campaign(2, 1, &[1], 1);
        future.schedule_at = Some(Utc::now() + chrono::Duration::hours(1));
        let mut no_line = ready_campaign(3, 1, &[1], 1);
        no_line.line_number = None;
        let harness = seeded(vec![ready_campaign(1, 1, &[1], 2), future, no_line]).await;
        let reconciler = reconciler(&harness);

        let report = reconciler.tick().await;
        assert_eq!(
            report,
            TickReport {
                listed: 3,
                invalid: 2,
                dispatched: 1,
                ..TickReport::default()
            }
        );
        reconciler.wait_idle().await;

        assert!(campaigns::exists(&harness.db, 1).await.unwrap());
        assert!(!campaigns::exists(&harness.db, 2).await.unwrap());
        let alerts = harness.notifier.wait_for(2, Duration::from_secs(2)).await;
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|(to, _)| to == ADMIN_MOBILE));
    }

    #[tokio::test]
    async fn re_tick_is_idempotent() {
        let harness = seeded(vec![ready_campaign(1, 1, &[1], 2)]).await;
        let reconciler = reconciler(&harness);

        assert_eq!(reconciler.tick().await.dispatched, 1);
        reconciler.wait_idle().await;
        let second = reconciler.tick().await;
        reconciler.wait_idle().await;

        assert_eq!(second.dispatched, 0);
        assert_eq!(second.already_processed, 1);
        assert_eq!(harness.gateway.sent_messages().await.len(), 2);
        assert_eq!(
            harness
                .control
                .count(|c| *c == ControlPlaneCall::Running(1))
                .await,
            1
        );
    }

    #[tokio::test]
    async fn in_flight_campaign_is_not_dispatched_twice() {
        let harness = seeded(vec![ready_campaign(1, 1, &[1], 2)]).await;
        let gate = harness.control.pause_running().await;
        let reconciler = reconciler(&harness);

        assert_eq!(reconciler.tick().await.dispatched, 1);
        let second = reconciler.tick().await;
        assert_eq!(second.in_flight, 1);
        assert_eq!(second.dispatched, 0);

        gate.add_permits(1);
        reconciler.wait_idle().await;
        assert_eq!(reconciler.in_flight(), 0);
        assert_eq!(campaigns::count_for_campaign(&harness.db, 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn in_flight_entry_is_released_when_the_task_panics() {
        let in_flight = Arc::new(DashSet::new());
        in_flight.insert(9);
        let guard = InFlightGuard {
            in_flight: in_flight.clone(),
            campaign_id: 9,
        };

        let result = tokio::spawn(async move {
            let _guard = guard;
            let crashed = true;
            if crashed {
                panic!("campaign task crashed");
            }
        })
        .await;
        assert!(result.unwrap_err().is_panic());
        assert!(!in_flight.contains(&9));
    }

    #[tokio::test]
    async fn login_failure_alerts_and_abandons_the_tick() {
        let harness = seeded(vec![ready_campaign(1, 1, &[1], 2)]).await;
        harness.control.fail("login").await;
        let reconciler = reconciler(&harness);

        assert_eq!(reconciler.tick().await, TickReport::default());
        let alerts = harness.notifier.wait_for(1, Duration::from_secs(2)).await;
        assert!(alerts[0].1.contains("login failed"));
        assert_eq!(
            harness
                .control
                .count(|c| *c == ControlPlaneCall::ListReady)
                .await,
            0
        );
    }

    #[tokio::test]
    async fn processing_failure_is_alerted_and_retried_next_tick() {
        let harness = seeded(vec![ready_campaign(1, 1, &[1], 2)]).await;
        harness.control.fail("allocate").await;
        let reconciler = reconciler(&harness);

        reconciler.tick().await;
        reconciler.wait_idle().await;
        let alerts = harness.notifier.wait_for(1, Duration::from_secs(2)).await;
        assert!(alerts[0].1.contains("campaign id=1"));
        assert!(!campaigns::exists(&harness.db, 1).await.unwrap());

        harness.control.recover("allocate").await;
        assert_eq!(reconciler.tick().await.dispatched, 1);
        reconciler.wait_idle().await;
        assert!(campaigns::exists(&harness.db, 1).await.unwrap());
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let harness = seeded(vec![]).await;
        let reconciler = Arc::new(reconciler(&harness));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let reconciler = reconciler.clone();
            let cancel = cancel.clone();
            async move { reconciler.run(cancel).await }
        });
        // The first tick fires immediately.
        tokio::time::timeout(Duration::from_secs(2), async {
            while harness.control.count(|c| *c == ControlPlaneCall::Login).await == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(reconciler.drain(Duration::from_secs(1)).await);
    }
}

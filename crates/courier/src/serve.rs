// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve`, `courier tick` and `courier reconcile-status`.
//!
//! Wires the database, both HTTP clients, the reconciliation loop and the
//! status worker together. `serve` runs both loops until a shutdown signal,
//! then drains in-flight campaigns.

use std::sync::Arc;
use std::time::Duration;

use courier_bot::BotClient;
use courier_config::model::CourierConfig;
use courier_core::{ControlPlane, CourierError, Notifier, SmsGateway};
use courier_scheduler::{
    AdminAlerter, CampaignProcessor, DeliverySettings, Reconciler, SmsNotifier, StatusWorker,
    TrackingAllocator,
};
use courier_sms::PayamClient;
use courier_storage::Database;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::shutdown;

/// The assembled scheduler: both loops sharing one database and one pair of
/// external clients.
pub struct Scheduler {
    pub reconciler: Arc<Reconciler>,
    pub status_worker: Arc<StatusWorker>,
    drain_timeout: Duration,
}

impl Scheduler {
    /// Build both loops over the given collaborators.
    ///
    /// Admin alerts go out through the SMS gateway from `admin.sender`; with
    /// no sender line configured they are dropped.
    pub fn assemble(
        config: &CourierConfig,
        db: Database,
        control: Arc<dyn ControlPlane>,
        gateway: Arc<dyn SmsGateway>,
    ) -> Self {
        let notifier = config
            .admin
            .sender
            .as_deref()
            .filter(|sender| !sender.trim().is_empty())
            .map(|sender| {
                Arc::new(SmsNotifier::new(gateway.clone(), sender)) as Arc<dyn Notifier>
            });
        if notifier.is_none() {
            info!("admin alerts disabled (no admin.sender configured)");
        }
        let alerter = AdminAlerter::new(config.admin.mobile.clone(), notifier);

        let processor = CampaignProcessor::new(
            db.clone(),
            control.clone(),
            gateway.clone(),
            TrackingAllocator::new(db.clone(), &config.tracking),
            DeliverySettings::from_config(&config.scheduler),
        );
        let reconciler = Reconciler::new(
            db.clone(),
            control.clone(),
            Arc::new(processor),
            alerter.clone(),
            Duration::from_secs(config.scheduler.interval_secs),
            config.scheduler.max_in_flight_campaigns,
        );
        let status_worker =
            StatusWorker::new(db, gateway, control, alerter, &config.status_worker);

        Self {
            reconciler: Arc::new(reconciler),
            status_worker: Arc::new(status_worker),
            drain_timeout: Duration::from_secs(config.scheduler.drain_timeout_secs),
        }
    }

    /// Run both loops until `cancel` fires, then drain in-flight campaigns.
    pub async fn run(&self, cancel: CancellationToken) {
        let reconciler = self.reconciler.clone();
        let reconcile_cancel = cancel.clone();
        let reconcile_task = tokio::spawn(async move { reconciler.run(reconcile_cancel).await });

        let status_worker = self.status_worker.clone();
        let status_cancel = cancel.clone();
        let status_task = tokio::spawn(async move { status_worker.run(status_cancel).await });

        let (reconcile_result, status_result) = tokio::join!(reconcile_task, status_task);
        if let Err(e) = reconcile_result {
            error!(error = %e, "reconciliation loop task failed");
        }
        if let Err(e) = status_result {
            error!(error = %e, "status worker task failed");
        }

        info!(
            in_flight = self.reconciler.in_flight(),
            timeout_secs = self.drain_timeout.as_secs(),
            "draining in-flight campaigns"
        );
        if !self.reconciler.drain(self.drain_timeout).await {
            warn!(
                in_flight = self.reconciler.in_flight(),
                "drain timeout elapsed with campaigns still running"
            );
        }
    }
}

/// Open the configured database with its lock-wait setting.
pub async fn open_database(config: &CourierConfig) -> Result<Database, CourierError> {
    Database::open_with_busy_timeout(
        &config.storage.database_path,
        Duration::from_millis(config.storage.busy_timeout_ms),
    )
    .await
}

/// Build the control-plane and SMS provider clients.
fn connect(
    config: &CourierConfig,
) -> Result<(Arc<dyn ControlPlane>, Arc<dyn SmsGateway>), CourierError> {
    let control = BotClient::new(&config.bot)?;
    let gateway = PayamClient::new(&config.sms)?;
    Ok((Arc::new(control), Arc::new(gateway)))
}

async fn build(config: &CourierConfig) -> Result<(Database, Scheduler), CourierError> {
    let db = open_database(config).await?;
    let (control, gateway) = connect(config)?;
    let scheduler = Scheduler::assemble(config, db.clone(), control, gateway);
    Ok((db, scheduler))
}

/// Run the `courier serve` command.
pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.daemon.log_level);
    info!("starting courier serve");

    let (db, scheduler) = build(&config).await?;
    let cancel = shutdown::install_signal_handler();
    scheduler.run(cancel).await;

    drop(scheduler);
    if let Err(e) = db.close().await {
        warn!(error = %e, "failed to close database cleanly");
    }
    info!("courier serve shutdown complete");
    Ok(())
}

/// Run the `courier tick` command.
pub async fn run_tick(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.daemon.log_level);

    let (_db, scheduler) = build(&config).await?;
    let report = scheduler.reconciler.tick().await;
    scheduler.reconciler.wait_idle().await;

    println!(
        "listed={} invalid={} already_processed={} in_flight={} dispatched={}",
        report.listed,
        report.invalid,
        report.already_processed,
        report.in_flight,
        report.dispatched
    );
    Ok(())
}

/// Run the `courier reconcile-status` command.
pub async fn run_status_pass(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.daemon.log_level);

    let (_db, scheduler) = build(&config).await?;
    let report = scheduler.status_worker.run_once().await;

    println!(
        "due={} succeeded={} failed={} pushed={}",
        report.due, report.succeeded, report.failed, report.pushed
    );
    Ok(())
}

/// Initialize the tracing subscriber with an env-filter.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the scheduler: reconcile, deliver, reconcile status.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use courier_core::{ProfileColor, SmsStatus};
use courier_scheduler::{
    AdminAlerter, CampaignProcessor, DeliverySettings, Reconciler, StatusWorker,
    TrackingAllocator,
};
use courier_storage::models::{NewSelection, SelectionMode};
use courier_storage::queries::{campaigns, selections, sent, status_jobs};
use courier_test_utils::{ControlPlaneCall, MOCK_BOT_TOKEN, TestHarness, ready_campaign};

fn processor(harness: &TestHarness) -> CampaignProcessor {
    CampaignProcessor::new(
        harness.db.clone(),
        harness.control.clone(),
        harness.gateway.clone(),
        TrackingAllocator::new(harness.db.clone(), &harness.config.tracking),
        DeliverySettings::from_config(&harness.config.scheduler),
    )
}

fn alerter(harness: &TestHarness) -> AdminAlerter {
    AdminAlerter::new(
        harness.config.admin.mobile.clone(),
        Some(harness.notifier.clone()),
    )
}

fn reconciler(harness: &TestHarness) -> Reconciler {
    Reconciler::new(
        harness.db.clone(),
        harness.control.clone(),
        Arc::new(processor(harness)),
        alerter(harness),
        Duration::from_secs(60),
        None,
    )
}

fn parse(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts)
        .expect("storage timestamps are RFC 3339")
        .with_timezone(&Utc)
}

/// White profiles come first, pinks fill the rest, and every recipient gets
/// its own short-link code and tracking ID.
#[tokio::test]
async fn campaign_is_delivered_to_whites_then_pinks() {
    let harness = TestHarness::builder()
        .with_campaigns(vec![ready_campaign(10, 3, &[5], 3)])
        .build()
        .await
        .unwrap();
    harness.seed_tag(5).await.unwrap();
    let whites = harness.seed_profiles(5, ProfileColor::White, 2).await.unwrap();
    let pinks = harness.seed_profiles(5, ProfileColor::Pink, 5).await.unwrap();

    let reconciler = reconciler(&harness);
    let report = reconciler.tick().await;
    assert_eq!(report.dispatched, 1);
    reconciler.wait_idle().await;

    let processed = campaigns::get_by_campaign_id(&harness.db, 10)
        .await
        .unwrap()
        .expect("campaign committed");
    assert_eq!(processed.audience_ids, vec![whites[1], whites[0], pinks[4]]);
    assert_eq!(processed.audience_codes, vec!["c00000", "c00001", "c00002"]);
    assert_eq!(processed.last_audience_id, Some(pinks[4]));

    let messages = harness.gateway.sent_messages().await;
    assert_eq!(messages.len(), 3);
    for ((message, id), code) in messages
        .iter()
        .zip(&processed.audience_ids)
        .zip(&processed.audience_codes)
    {
        assert_eq!(Some(message.recipient.clone()), harness.phone_of(*id));
        assert!(message.body.contains(&format!("jo1n.ir/{code}")));
    }
    let tracking: HashSet<&str> = messages.iter().map(|m| m.tracking_id.as_str()).collect();
    assert_eq!(tracking.len(), 3);

    let rows = sent::list_for_campaign(&harness.db, processed.id).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.status == SmsStatus::Sent));

    let key = courier_scheduler::tags_hash(&["5".to_string()]);
    let selection = selections::latest(&harness.db, 3, &key)
        .await
        .unwrap()
        .expect("selection recorded");
    assert_eq!(selection.audience_ids, processed.audience_ids);

    assert_eq!(
        harness
            .control
            .count(|c| *c == ControlPlaneCall::Executed(10))
            .await,
        1
    );
}

/// Each sent batch schedules one status job per configured offset, all
/// sharing one correlation ID.
#[tokio::test]
async fn status_checks_are_scheduled_at_each_offset() {
    let harness = TestHarness::builder()
        .with_campaigns(vec![ready_campaign(11, 1, &[1], 2)])
        .build()
        .await
        .unwrap();
    harness.seed_tag(1).await.unwrap();
    harness.seed_profiles(1, ProfileColor::White, 2).await.unwrap();

    let before = Utc::now();
    let reconciler = reconciler(&harness);
    reconciler.tick().await;
    reconciler.wait_idle().await;

    let processed = campaigns::get_by_campaign_id(&harness.db, 11)
        .await
        .unwrap()
        .unwrap();
    let jobs = status_jobs::list_for_campaign(&harness.db, processed.id)
        .await
        .unwrap();
    assert_eq!(jobs.len(), 4);
    assert!(jobs.iter().all(|j| j.correlation_id == jobs[0].correlation_id));
    assert!(jobs.iter().all(|j| j.tracking_ids.len() == 2));

    let offsets: Vec<i64> = jobs
        .iter()
        .map(|j| (parse(&j.scheduled_at) - before).num_seconds())
        .collect();
    for (offset, expected) in offsets.iter().zip([300, 900, 3_600, 180_000]) {
        assert!(
            (expected..expected + 5).contains(offset),
            "offset {offset} not near {expected}"
        );
    }

    // Nothing is due yet.
    let worker = StatusWorker::new(
        harness.db.clone(),
        harness.gateway.clone(),
        harness.control.clone(),
        alerter(&harness),
        &harness.config.status_worker,
    );
    assert_eq!(worker.run_once().await.due, 0);
}

/// Two reconcilers sharing one database never process a campaign twice.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reconcilers_process_a_campaign_once() {
    let harness = TestHarness::builder()
        .with_campaigns(vec![ready_campaign(12, 1, &[1], 2)])
        .build()
        .await
        .unwrap();
    harness.seed_tag(1).await.unwrap();
    harness.seed_profiles(1, ProfileColor::White, 4).await.unwrap();

    let first = reconciler(&harness);
    let second = reconciler(&harness);
    let (a, b) = tokio::join!(first.tick(), second.tick());
    assert_eq!(a.listed + b.listed, 2);
    tokio::join!(first.wait_idle(), second.wait_idle());

    assert_eq!(campaigns::count_for_campaign(&harness.db, 12).await.unwrap(), 1);
    assert_eq!(harness.gateway.sent_messages().await.len(), 2);
    assert_eq!(sent::count_all(&harness.db).await.unwrap(), 2);

    // A later tick sees the committed row and dispatches nothing.
    let again = first.tick().await;
    assert_eq!(again.already_processed, 1);
    assert_eq!(again.dispatched, 0);
}

/// After the checks come due, the status worker reports delivery back to the
/// control plane.
#[tokio::test]
async fn due_status_checks_push_statistics() {
    let harness = TestHarness::builder()
        .with_campaigns(vec![ready_campaign(13, 1, &[1], 3)])
        .configure(|config| {
            config.scheduler.status_check_offsets_secs = vec![0, 900, 3_600, 180_000]
        })
        .build()
        .await
        .unwrap();
    harness.seed_tag(1).await.unwrap();
    harness.seed_profiles(1, ProfileColor::Pink, 3).await.unwrap();

    let reconciler = reconciler(&harness);
    reconciler.tick().await;
    reconciler.wait_idle().await;

    let worker = StatusWorker::new(
        harness.db.clone(),
        harness.gateway.clone(),
        harness.control.clone(),
        alerter(&harness),
        &harness.config.status_worker,
    );
    let report = worker.run_once().await;
    assert_eq!(report.due, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.pushed, 1);

    let pushed = harness.control.pushed_statistics().await;
    assert_eq!(pushed[0].0, 13);
    assert_eq!(pushed[0].1.aggregated_total_records, 3);
    assert_eq!(pushed[0].1.aggregated_total_sent, 3);
    assert_eq!(pushed[0].1.aggregated_total_delivered_parts, 3);
}

/// A pool of five where three were already sent to for this customer and tag
/// set: returns the seeded pool, newest last.
async fn pool_with_history(harness: &TestHarness, customer_id: u64) -> Vec<i64> {
    harness.seed_tag(1).await.unwrap();
    let pool = harness.seed_profiles(1, ProfileColor::White, 5).await.unwrap();
    selections::persist(
        &harness.db,
        NewSelection {
            customer_id,
            tags_hash: courier_scheduler::tags_hash(&["1".to_string()]),
            correlation_id: "earlier-campaign".into(),
            audience_ids: vec![pool[4], pool[3], pool[2]],
            mode: SelectionMode::Merge,
            based_on: None,
        },
    )
    .await
    .unwrap();
    pool
}

/// While fresh profiles remain, the new recipients are merged into the
/// history.
#[tokio::test]
async fn fresh_recipients_are_merged_into_history() {
    let harness = TestHarness::new().await.unwrap();
    let pool = pool_with_history(&harness, 4).await;
    let campaign = ready_campaign(20, 4, &[1], 2);

    let report = processor(&harness)
        .process(MOCK_BOT_TOKEN, &campaign)
        .await
        .unwrap();
    assert_eq!(report.recipients, 2);

    let processed = campaigns::get(&harness.db, report.processed_campaign_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(processed.audience_ids, vec![pool[1], pool[0]]);

    let key = courier_scheduler::tags_hash(&campaign.tags);
    let history = selections::latest(&harness.db, 4, &key)
        .await
        .unwrap()
        .unwrap();
    let mut everyone = pool.clone();
    everyone.sort_unstable();
    assert_eq!(history.audience_ids, everyone);
    assert_eq!(processed.audience_selection_id, Some(history.id));
}

/// When the fresh pool is too small, the whole pool is reselected and the
/// history restarts from exactly the recipients just sent to.
#[tokio::test]
async fn exhausted_pool_resets_history_to_the_new_recipients() {
    let harness = TestHarness::new().await.unwrap();
    let pool = pool_with_history(&harness, 4).await;
    let campaign = ready_campaign(21, 4, &[1], 4);

    let report = processor(&harness)
        .process(MOCK_BOT_TOKEN, &campaign)
        .await
        .unwrap();
    assert_eq!(report.recipients, 4);

    let chosen = vec![pool[4], pool[3], pool[2], pool[1]];
    let processed = campaigns::get(&harness.db, report.processed_campaign_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(processed.audience_ids, chosen);

    let key = courier_scheduler::tags_hash(&campaign.tags);
    let history = selections::latest(&harness.db, 4, &key)
        .await
        .unwrap()
        .unwrap();
    let mut snapshot = chosen.clone();
    snapshot.sort_unstable();
    assert_eq!(history.audience_ids, snapshot);

    let recipients: Vec<String> = harness
        .gateway
        .sent_messages()
        .await
        .into_iter()
        .map(|m| m.recipient)
        .collect();
    let expected: Vec<String> = chosen
        .iter()
        .map(|id| harness.phone_of(*id).unwrap())
        .collect();
    assert_eq!(recipients, expected);
}

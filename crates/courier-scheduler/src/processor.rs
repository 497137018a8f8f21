// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-campaign delivery pipeline.
//!
//! One call to [`CampaignProcessor::process`] takes a ready campaign through
//! running, audience commit, batched sends and executed. Every step is
//! sequential. The processed-campaign row is the at-most-once guard: once it
//! is committed the campaign is never processed again, whatever happens to
//! the sends that follow.

use std::sync::Arc;

use chrono::{Duration, Utc};
use courier_config::model::SchedulerConfig;
use courier_core::{Campaign, ControlPlane, CourierError, OutboundSms, SmsGateway};
use courier_storage::models::{CampaignPlan, PendingSms, ProcessedCampaign};
use courier_storage::queries::{campaigns, sent, status_jobs};
use courier_storage::{Database, format_timestamp};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::allocator::TrackingAllocator;
use crate::audience::AudienceSelector;

/// Plans attempted before a campaign whose audience history keeps changing
/// underneath it is given up until the next tick.
const MAX_PLAN_ATTEMPTS: usize = 3;

/// Message-building and batching settings.
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub batch_size: usize,
    pub link_placeholder: String,
    pub short_link_domain: String,
    pub opt_out_suffix: String,
    pub status_check_offsets: Vec<Duration>,
}

impl DeliverySettings {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            link_placeholder: config.link_placeholder.clone(),
            short_link_domain: config.short_link_domain.clone(),
            opt_out_suffix: config.opt_out_suffix.clone(),
            status_check_offsets: config
                .status_check_offsets_secs
                .iter()
                .filter_map(|secs| i64::try_from(*secs).ok().and_then(Duration::try_seconds))
                .collect(),
        }
    }

    /// Personalize `content` for one recipient.
    ///
    /// The link placeholder becomes `<short_link_domain><code>` when the
    /// campaign has an ad-link (`code` is `Some`) and is removed otherwise.
    /// The opt-out suffix is always appended.
    pub fn build_body(&self, content: Option<&str>, code: Option<&str>) -> String {
        let content = content.unwrap_or_default();
        let link = match code {
            Some(code) => format!("{}{code}", self.short_link_domain),
            None => String::new(),
        };
        let mut body = content.replace(&self.link_placeholder, &link);
        body.push_str(&self.opt_out_suffix);
        body
    }
}

/// Outcome of one campaign run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignRunReport {
    pub campaign_id: u64,
    pub processed_campaign_id: i64,
    pub recipients: usize,
    pub batches: usize,
    pub batches_sent: usize,
    pub status_jobs: usize,
}

/// Runs the delivery pipeline for one campaign.
pub struct CampaignProcessor {
    db: Database,
    control: Arc<dyn ControlPlane>,
    gateway: Arc<dyn SmsGateway>,
    selector: AudienceSelector,
    allocator: TrackingAllocator,
    settings: DeliverySettings,
}

impl CampaignProcessor {
    pub fn new(
        db: Database,
        control: Arc<dyn ControlPlane>,
        gateway: Arc<dyn SmsGateway>,
        allocator: TrackingAllocator,
        settings: DeliverySettings,
    ) -> Self {
        Self {
            selector: AudienceSelector::new(db.clone()),
            db,
            control,
            gateway,
            allocator,
            settings,
        }
    }

    /// Deliver `campaign`.
    ///
    /// Fails before any send when the campaign cannot be moved to running,
    /// its audience cannot be committed, or another run already committed it
    /// (`CourierError::AlreadyProcessed`). Provider failures on individual
    /// batches are logged and skipped. A failure to move the campaign to
    /// executed is returned after all batches were attempted.
    pub async fn process(
        &self,
        token: &str,
        campaign: &Campaign,
    ) -> Result<CampaignRunReport, CourierError> {
        let sender = campaign
            .sender()
            .ok_or_else(|| {
                CourierError::Validation(format!("campaign {} has no line number", campaign.id))
            })?
            .to_string();

        self.control.move_to_running(token, campaign.id).await?;
        info!(campaign_id = campaign.id, "campaign moved to running");

        let (processed, phones) = self.commit_audience(token, campaign).await?;
        info!(
            campaign_id = campaign.id,
            processed_campaign_id = processed.id,
            recipients = phones.len(),
            "processed campaign committed"
        );

        let mut report = CampaignRunReport {
            campaign_id: campaign.id,
            processed_campaign_id: processed.id,
            recipients: phones.len(),
            ..CampaignRunReport::default()
        };

        let batch_size = self.settings.batch_size;
        for start in (0..phones.len()).step_by(batch_size) {
            let end = (start + batch_size).min(phones.len());
            report.batches += 1;
            let jobs = self
                .deliver_batch(
                    campaign,
                    &processed,
                    &sender,
                    &phones[start..end],
                    &processed.audience_ids[start..end],
                    &processed.audience_codes[start..end],
                )
                .await?;
            if let Some(jobs) = jobs {
                report.batches_sent += 1;
                report.status_jobs += jobs;
            }
        }
        info!(
            campaign_id = campaign.id,
            batches = report.batches,
            batches_sent = report.batches_sent,
            "all batches attempted"
        );

        if let Err(e) = self.control.move_to_executed(token, campaign.id).await {
            warn!(campaign_id = campaign.id, error = %e, "failed to move campaign to executed");
            return Err(e);
        }
        info!(campaign_id = campaign.id, "campaign moved to executed");
        Ok(report)
    }

    /// Plan and commit the audience, re-planning when another campaign for
    /// the same customer and tag set committed first.
    async fn commit_audience(
        &self,
        token: &str,
        campaign: &Campaign,
    ) -> Result<(ProcessedCampaign, Vec<String>), CourierError> {
        let mut attempt = 1;
        loop {
            match self.plan_and_commit(token, campaign).await {
                Err(CourierError::SelectionConflict { .. }) if attempt < MAX_PLAN_ATTEMPTS => {
                    info!(
                        campaign_id = campaign.id,
                        attempt,
                        "audience history changed while planning, re-planning"
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Select the audience, allocate short links, and commit the processed
    /// campaign with its selection in one transaction.
    async fn plan_and_commit(
        &self,
        token: &str,
        campaign: &Campaign,
    ) -> Result<(ProcessedCampaign, Vec<String>), CourierError> {
        let correlation_id = Uuid::new_v4().to_string();
        let plan = self.selector.select(campaign, &correlation_id).await?;

        let codes = match campaign.ad_link() {
            Some(link) if !plan.phones.is_empty() => {
                self.control
                    .allocate_short_links(token, campaign.id, Some(link), &plan.phones)
                    .await?
            }
            _ => vec![String::new(); plan.phones.len()],
        };
        if codes.len() != plan.phones.len() {
            return Err(CourierError::Api {
                service: "control-plane",
                message: format!(
                    "allocated {} short links for {} recipients",
                    codes.len(),
                    plan.phones.len()
                ),
            });
        }

        let campaign_json = serde_json::to_string(campaign)
            .map_err(|e| CourierError::Internal(format!("failed to snapshot campaign: {e}")))?;
        let processed = campaigns::commit_plan(
            &self.db,
            CampaignPlan {
                campaign_id: campaign.id,
                campaign_json,
                audience_ids: plan.ids,
                audience_codes: codes,
                selection: plan.selection,
            },
        )
        .await?;
        Ok((processed, plan.phones))
    }

    /// Persist one batch as pending, send it, and schedule its status checks.
    ///
    /// Returns the number of status jobs scheduled, or `None` when the
    /// provider call failed.
    async fn deliver_batch(
        &self,
        campaign: &Campaign,
        processed: &ProcessedCampaign,
        sender: &str,
        phones: &[String],
        ids: &[i64],
        codes: &[String],
    ) -> Result<Option<usize>, CourierError> {
        let Some(&last_audience_id) = ids.last() else {
            return Ok(Some(0));
        };
        let tracking_ids = self.allocator.allocate(phones.len()).await?;
        let has_link = campaign.ad_link().is_some();

        let messages: Vec<OutboundSms> = phones
            .iter()
            .zip(codes)
            .zip(&tracking_ids)
            .map(|((phone, code), tracking_id)| OutboundSms {
                recipient: phone.clone(),
                body: self.settings.build_body(
                    campaign.content.as_deref(),
                    has_link.then_some(code.as_str()),
                ),
                tracking_id: tracking_id.clone(),
            })
            .collect();
        let pending = messages
            .iter()
            .map(|m| PendingSms {
                phone_number: m.recipient.clone(),
                tracking_id: m.tracking_id.clone(),
            })
            .collect();

        campaigns::record_pending_batch(&self.db, processed.id, pending, last_audience_id).await?;
        debug!(
            campaign_id = campaign.id,
            size = messages.len(),
            last_audience_id,
            "batch checkpointed as pending"
        );

        let acks = match self.gateway.send_batch(sender, &messages).await {
            Ok(acks) => acks,
            Err(e) => {
                warn!(campaign_id = campaign.id, error = %e, "sms batch send failed, continuing");
                return Ok(None);
            }
        };

        let acks: Vec<_> = acks
            .into_iter()
            .filter(|ack| !ack.tracking_id.is_empty())
            .collect();
        match sent::apply_acks(&self.db, acks).await {
            Ok(updated) => debug!(campaign_id = campaign.id, updated, "provider acks applied"),
            Err(e) => warn!(campaign_id = campaign.id, error = %e, "failed to apply provider acks"),
        }

        let now = Utc::now();
        let scheduled_at = self
            .settings
            .status_check_offsets
            .iter()
            .map(|offset| format_timestamp(now + *offset))
            .collect();
        match status_jobs::schedule(
            &self.db,
            processed.id,
            &Uuid::new_v4().to_string(),
            tracking_ids,
            scheduled_at,
        )
        .await
        {
            Ok(jobs) => Ok(Some(jobs.len())),
            Err(e) => {
                warn!(campaign_id = campaign.id, error = %e, "failed to schedule status jobs");
                Ok(Some(0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audience::tags_hash;
    use courier_config::model::TrackingConfig;
    use courier_storage::queries::selections;
    use std::collections::HashSet;
    use courier_core::{ProfileColor, SmsStatus};
    use courier_test_utils::{ControlPlaneCall, MOCK_BOT_TOKEN, TestHarness, ready_campaign};

    fn settings() -> DeliverySettings {
        DeliverySettings::from_config(&SchedulerConfig::default())
    }

    fn processor(harness: &TestHarness) -> CampaignProcessor {
        CampaignProcessor::new(
            harness.db.clone(),
            harness.control.clone(),
            harness.gateway.clone(),
            TrackingAllocator::new(harness.db.clone(), &TrackingConfig::default()),
            DeliverySettings::from_config(&harness.config.scheduler),
        )
    }

    #[test]
    fn body_substitutes_short_link_and_appends_opt_out() {
        let body = settings().build_body(Some("Sale \u{1F517} today"), Some("ab12"));
        assert_eq!(body, "Sale jo1n.ir/ab12 today\nلغو۱۱");
    }

    #[test]
    fn body_without_ad_link_drops_placeholder() {
        let body = settings().build_body(Some("Hi \u{1F517}!"), None);
        assert_eq!(body, "Hi !\nلغو۱۱");
        assert_eq!(settings().build_body(None, None), "\nلغو۱۱");
    }

    #[test]
    fn default_offsets_are_the_four_recheck_delays() {
        let offsets: Vec<i64> = settings()
            .status_check_offsets
            .iter()
            .map(|d| d.num_seconds())
            .collect();
        assert_eq!(offsets, vec![300, 900, 3600, 180_000]);
    }

    #[tokio::test]
    async fn sends_in_ceil_batches_with_increasing_tracking_ids() {
        let harness = TestHarness::builder().with_batch_size(2).build().await.unwrap();
        harness.seed_tag(1).await.unwrap();
        harness.seed_profiles(1, ProfileColor::White, 5).await.unwrap();

        let report = processor(&harness)
            .process(MOCK_BOT_TOKEN, &ready_campaign(10, 1, &[1], 5))
            .await
            .unwrap();
        assert_eq!(report.recipients, 5);
        assert_eq!(report.batches, 3);
        assert_eq!(report.batches_sent, 3);
        assert_eq!(report.status_jobs, 12);

        let sends = harness.gateway.sends().await;
        let sizes: Vec<usize> = sends.iter().map(|(_, items)| items.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(sends.iter().all(|(sender, _)| sender == "3000"));

        let tracking: Vec<String> = harness
            .gateway
            .sent_messages()
            .await
            .into_iter()
            .map(|m| m.tracking_id)
            .collect();
        let mut sorted = tracking.clone();
        sorted.sort();
        assert_eq!(tracking, sorted);
        assert_eq!(tracking[0], "0000000000000001");

        let pc = campaigns::get(&harness.db, report.processed_campaign_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pc.last_audience_id, pc.audience_ids.last().copied());
        let rows = sent::list_for_campaign(&harness.db, pc.id).await.unwrap();
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.status == SmsStatus::Sent));
    }

    #[tokio::test]
    async fn bodies_carry_codes_in_recipient_order() {
        let harness = TestHarness::new().await.unwrap();
        harness.seed_tag(1).await.unwrap();
        harness.seed_profiles(1, ProfileColor::White, 2).await.unwrap();

        processor(&harness)
            .process(MOCK_BOT_TOKEN, &ready_campaign(10, 1, &[1], 2))
            .await
            .unwrap();

        let bodies: Vec<String> = harness
            .gateway
            .sent_messages()
            .await
            .into_iter()
            .map(|m| m.body)
            .collect();
        assert_eq!(
            bodies,
            vec![
                "Spring sale jo1n.ir/c00000\nلغو۱۱",
                "Spring sale jo1n.ir/c00001\nلغو۱۱"
            ]
        );
    }

    #[tokio::test]
    async fn campaign_without_ad_link_skips_allocation() {
        let harness = TestHarness::new().await.unwrap();
        harness.seed_tag(1).await.unwrap();
        harness.seed_profiles(1, ProfileColor::White, 2).await.unwrap();
        let mut campaign = ready_campaign(10, 1, &[1], 2);
        campaign.ad_link = None;

        let report = processor(&harness)
            .process(MOCK_BOT_TOKEN, &campaign)
            .await
            .unwrap();
        assert_eq!(report.recipients, 2);
        assert_eq!(
            harness
                .control
                .count(|c| matches!(c, ControlPlaneCall::AllocateShortLinks { .. }))
                .await,
            0
        );
        let pc = campaigns::get(&harness.db, report.processed_campaign_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pc.audience_codes, vec!["", ""]);
        assert!(
            harness
                .gateway
                .sent_messages()
                .await
                .iter()
                .all(|m| m.body == "Spring sale \nلغو۱۱")
        );
    }

    #[tokio::test]
    async fn failed_batch_is_skipped_and_later_batches_proceed() {
        let harness = TestHarness::builder().with_batch_size(2).build().await.unwrap();
        harness.seed_tag(1).await.unwrap();
        harness.seed_profiles(1, ProfileColor::White, 4).await.unwrap();
        harness.gateway.fail_batch(0).await;

        let report = processor(&harness)
            .process(MOCK_BOT_TOKEN, &ready_campaign(10, 1, &[1], 4))
            .await
            .unwrap();
        assert_eq!(report.batches, 2);
        assert_eq!(report.batches_sent, 1);
        assert_eq!(report.status_jobs, 4);

        let rows = sent::list_for_campaign(&harness.db, report.processed_campaign_id)
            .await
            .unwrap();
        let pending = rows.iter().filter(|r| r.status == SmsStatus::Pending).count();
        let sent_rows = rows.iter().filter(|r| r.status == SmsStatus::Sent).count();
        assert_eq!((pending, sent_rows), (2, 2));
        assert_eq!(
            harness.control.calls().await.last(),
            Some(&ControlPlaneCall::Executed(10))
        );
    }

    #[tokio::test]
    async fn rejected_recipients_are_marked_failed() {
        let harness = TestHarness::new().await.unwrap();
        harness.seed_tag(1).await.unwrap();
        let ids = harness.seed_profiles(1, ProfileColor::White, 2).await.unwrap();
        let blocked = harness.phone_of(ids[0]).unwrap();
        harness.gateway.reject_recipient(&blocked).await;

        let report = processor(&harness)
            .process(MOCK_BOT_TOKEN, &ready_campaign(10, 1, &[1], 2))
            .await
            .unwrap();
        let rows = sent::list_for_campaign(&harness.db, report.processed_campaign_id)
            .await
            .unwrap();
        let failed = rows.iter().find(|r| r.phone_number == blocked).unwrap();
        assert_eq!(failed.status, SmsStatus::Failed);
        assert_eq!(failed.error_code.as_deref(), Some("14"));
    }

    #[tokio::test]
    async fn second_run_is_rejected_as_already_processed() {
        let harness = TestHarness::new().await.unwrap();
        harness.seed_tag(1).await.unwrap();
        harness.seed_profiles(1, ProfileColor::White, 3).await.unwrap();
        let processor = processor(&harness);
        let campaign = ready_campaign(10, 1, &[1], 2);

        processor.process(MOCK_BOT_TOKEN, &campaign).await.unwrap();
        let err = processor.process(MOCK_BOT_TOKEN, &campaign).await.unwrap_err();
        assert!(matches!(err, CourierError::AlreadyProcessed { campaign_id: 10 }));
        assert_eq!(harness.gateway.sent_messages().await.len(), 2);
        assert_eq!(campaigns::count_for_campaign(&harness.db, 10).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_campaigns_for_one_audience_get_disjoint_recipients() {
        let harness = TestHarness::new().await.unwrap();
        harness.seed_tag(1).await.unwrap();
        let pool = harness.seed_profiles(1, ProfileColor::White, 4).await.unwrap();
        let processor = processor(&harness);
        let first = ready_campaign(10, 7, &[1], 2);
        let second = ready_campaign(11, 7, &[1], 2);

        let (a, b) = tokio::join!(
            processor.process(MOCK_BOT_TOKEN, &first),
            processor.process(MOCK_BOT_TOKEN, &second)
        );
        assert_eq!(a.unwrap().recipients, 2);
        assert_eq!(b.unwrap().recipients, 2);

        let phones: HashSet<String> = harness
            .gateway
            .sent_messages()
            .await
            .into_iter()
            .map(|m| m.recipient)
            .collect();
        assert_eq!(phones.len(), 4);

        let history = selections::latest(&harness.db, 7, &tags_hash(&first.tags))
            .await
            .unwrap()
            .unwrap();
        let mut everyone = pool.clone();
        everyone.sort_unstable();
        assert_eq!(history.audience_ids, everyone);
    }

    #[tokio::test]
    async fn running_failure_aborts_before_any_side_effect() {
        let harness = TestHarness::new().await.unwrap();
        harness.seed_tag(1).await.unwrap();
        harness.seed_profiles(1, ProfileColor::White, 2).await.unwrap();
        harness.control.fail("running").await;

        assert!(
            processor(&harness)
                .process(MOCK_BOT_TOKEN, &ready_campaign(10, 1, &[1], 2))
                .await
                .is_err()
        );
        assert!(!campaigns::exists(&harness.db, 10).await.unwrap());
        assert!(harness.gateway.sends().await.is_empty());
    }

    #[tokio::test]
    async fn allocation_failure_leaves_campaign_retryable() {
        let harness = TestHarness::new().await.unwrap();
        harness.seed_tag(1).await.unwrap();
        harness.seed_profiles(1, ProfileColor::White, 2).await.unwrap();
        harness.control.fail("allocate").await;
        let processor = processor(&harness);
        let campaign = ready_campaign(10, 1, &[1], 2);

        assert!(processor.process(MOCK_BOT_TOKEN, &campaign).await.is_err());
        assert!(!campaigns::exists(&harness.db, 10).await.unwrap());

        harness.control.recover("allocate").await;
        let report = processor.process(MOCK_BOT_TOKEN, &campaign).await.unwrap();
        assert_eq!(report.recipients, 2);
    }

    #[tokio::test]
    async fn executed_failure_is_returned_after_sending() {
        let harness = TestHarness::new().await.unwrap();
        harness.seed_tag(1).await.unwrap();
        harness.seed_profiles(1, ProfileColor::White, 1).await.unwrap();
        harness.control.fail("executed").await;

        assert!(
            processor(&harness)
                .process(MOCK_BOT_TOKEN, &ready_campaign(10, 1, &[1], 1))
                .await
                .is_err()
        );
        assert_eq!(harness.gateway.sent_messages().await.len(), 1);
        assert!(campaigns::exists(&harness.db, 10).await.unwrap());
    }
}

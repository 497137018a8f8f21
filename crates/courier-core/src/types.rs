// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across collaborator traits and the Courier scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CourierError;

/// Campaign status the control plane assigns once a campaign may be sent.
pub const CAMPAIGN_STATUS_APPROVED: &str = "approved";

// --- Control-plane types ---

/// A campaign as listed by the control plane. Read-only to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: u64,
    pub customer_id: u64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ad_link: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub schedule_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub line_number: Option<String>,
    #[serde(default)]
    pub budget: Option<u64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub num_audiences: u32,
}

impl Campaign {
    /// Checks that the campaign may be dispatched at `now`.
    ///
    /// A campaign is ready when it is approved, none of its timestamps lie in
    /// the future, and it carries a sender line number.
    pub fn validate_ready(&self, now: DateTime<Utc>) -> Result<(), CourierError> {
        if self.status != CAMPAIGN_STATUS_APPROVED {
            return Err(CourierError::Validation(format!(
                "campaign {} status is {:?}, expected approved",
                self.id, self.status
            )));
        }
        if self.schedule_at.is_some_and(|at| at > now) {
            return Err(CourierError::Validation(format!(
                "campaign {} schedule_at is in the future",
                self.id
            )));
        }
        if self.created_at > now {
            return Err(CourierError::Validation(format!(
                "campaign {} created_at is in the future",
                self.id
            )));
        }
        if self.updated_at > now {
            return Err(CourierError::Validation(format!(
                "campaign {} updated_at is in the future",
                self.id
            )));
        }
        if self.sender().is_none() {
            return Err(CourierError::Validation(format!(
                "campaign {} has no line number",
                self.id
            )));
        }
        Ok(())
    }

    /// The sender line, if present and non-empty.
    pub fn sender(&self) -> Option<&str> {
        self.line_number.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// The advertised link, if present and non-empty.
    pub fn ad_link(&self) -> Option<&str> {
        self.ad_link.as_deref().filter(|s| !s.is_empty())
    }
}

/// One row for the control plane's bulk short-link creation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLinkRecord {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub long_link: String,
    pub short_link: String,
}

/// Cumulative delivery statistics for one processed campaign.
///
/// Serialized with the key names the control plane expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStatistics {
    /// Number of sent-SMS rows recorded for the campaign.
    pub aggregated_total_records: i64,
    /// Number of messages with at least one delivery report.
    pub aggregated_total_sent: i64,
    pub aggregated_total_parts: i64,
    pub aggregated_total_delivered_parts: i64,
    #[serde(rename = "aggregatedTotalUnDeliveredParts")]
    pub aggregated_total_undelivered_parts: i64,
    #[serde(rename = "aggregatedTotalUnKnownParts")]
    pub aggregated_total_unknown_parts: i64,
    /// RFC 3339 timestamp of the recomputation.
    pub updated_at: String,
}

// --- SMS provider types ---

/// One outbound message handed to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundSms {
    pub recipient: String,
    pub body: String,
    pub tracking_id: String,
}

/// Per-recipient acknowledgement returned by a batch send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAck {
    #[serde(rename = "customerId")]
    pub tracking_id: String,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl SendAck {
    /// Outcome the acknowledgement implies for the sent-SMS row.
    pub fn outcome(&self) -> SmsStatus {
        let has_error = self.error_code.as_deref().is_some_and(|c| !c.is_empty());
        if self.server_id.is_some() && !has_error {
            SmsStatus::Sent
        } else {
            SmsStatus::Failed
        }
    }
}

/// Delivery report for one tracking ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    #[serde(rename = "customerId", default)]
    pub tracking_id: String,
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub total_parts: i64,
    #[serde(default)]
    pub total_delivered_parts: i64,
    #[serde(rename = "totalUnDeliveredParts", default)]
    pub total_undelivered_parts: i64,
    #[serde(rename = "totalUnKnownParts", default)]
    pub total_unknown_parts: i64,
    #[serde(default)]
    pub status: String,
}

// --- Persisted scheduler state ---

/// Lifecycle of a sent-SMS row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SmsStatus {
    Pending,
    Sent,
    Failed,
}

/// Audience tier; white profiles are selected before pink ones.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProfileColor {
    White,
    Pink,
}

/// The scheduler's own execution record for one campaign.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedCampaign {
    pub id: i64,
    pub campaign_id: u64,
    pub campaign_json: String,
    pub audience_ids: Vec<i64>,
    pub audience_codes: Vec<String>,
    pub last_audience_id: Option<i64>,
    pub audience_selection_id: Option<i64>,
    pub statistics: Option<CampaignStatistics>,
    pub created_at: String,
    pub updated_at: String,
}

/// One outbound message attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct SentSms {
    pub id: i64,
    pub processed_campaign_id: i64,
    pub phone_number: String,
    pub tracking_id: String,
    pub parts_delivered: i64,
    pub status: SmsStatus,
    pub server_id: Option<String>,
    pub error_code: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A delayed delivery-status recheck for one send batch.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusJob {
    pub id: i64,
    pub processed_campaign_id: i64,
    pub correlation_id: String,
    pub tracking_ids: Vec<String>,
    pub retry_count: i64,
    pub scheduled_at: String,
    pub executed_at: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
}

/// Persisted delivery report for one (processed campaign, tracking ID).
#[derive(Debug, Clone, PartialEq)]
pub struct StatusResult {
    pub id: i64,
    pub job_id: i64,
    pub processed_campaign_id: i64,
    pub tracking_id: String,
    pub server_id: Option<String>,
    pub total_parts: i64,
    pub delivered_parts: i64,
    pub undelivered_parts: i64,
    pub unknown_parts: i64,
    pub status: String,
}

/// Immutable record of the profiles consumed for a (customer, tag set).
#[derive(Debug, Clone, PartialEq)]
pub struct AudienceSelection {
    pub id: i64,
    pub customer_id: u64,
    pub tags_hash: String,
    pub correlation_id: String,
    pub audience_ids: Vec<i64>,
    pub created_at: String,
}

/// A selectable recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct AudienceProfile {
    pub id: i64,
    pub uid: String,
    pub phone_number: Option<String>,
    pub color: ProfileColor,
}

/// Audience tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The persisted row types live in `courier-core::types` so the scheduler and
//! test utilities share them; this module re-exports them and adds the
//! storage-only input and output shapes.

pub use courier_core::types::{
    AudienceProfile, AudienceSelection, CampaignStatistics, ProcessedCampaign, ProfileColor,
    SentSms, SmsStatus, StatusJob, StatusResult, Tag,
};

/// How a new audience selection relates to the latest one for its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Union with the latest selection's IDs.
    Merge,
    /// Only the newly chosen IDs.
    Snapshot,
}

/// A selection to persist alongside a processed campaign.
#[derive(Debug, Clone)]
pub struct NewSelection {
    pub customer_id: u64,
    pub tags_hash: String,
    pub correlation_id: String,
    pub audience_ids: Vec<i64>,
    pub mode: SelectionMode,
    /// ID of the latest selection for the key when the audience was picked.
    /// A commit is refused once a newer row exists.
    pub based_on: Option<i64>,
}

/// Everything committed atomically when a campaign starts processing.
#[derive(Debug, Clone)]
pub struct CampaignPlan {
    pub campaign_id: u64,
    pub campaign_json: String,
    pub audience_ids: Vec<i64>,
    pub audience_codes: Vec<String>,
    pub selection: NewSelection,
}

/// A pending message row to insert before the provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSms {
    pub phone_number: String,
    pub tracking_id: String,
}

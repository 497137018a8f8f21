// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Control-plane trait for the campaign-management API.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::{Campaign, CampaignStatistics, ShortLinkRecord};

/// Client for the campaign-management API that owns campaign state.
///
/// All calls except [`login`](ControlPlane::login) take the bearer token
/// returned by a previous login.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Authenticates the scheduler's bot account and returns an access token.
    async fn login(&self) -> Result<String, CourierError>;

    /// Lists campaigns the control plane considers ready to send.
    async fn list_ready_campaigns(&self, token: &str) -> Result<Vec<Campaign>, CourierError>;

    /// Moves a campaign to `running`.
    async fn move_to_running(&self, token: &str, campaign_id: u64) -> Result<(), CourierError>;

    /// Moves a campaign to `executed`.
    async fn move_to_executed(&self, token: &str, campaign_id: u64) -> Result<(), CourierError>;

    /// Allocates one short-link code per phone, returned in phone order.
    async fn allocate_short_links(
        &self,
        token: &str,
        campaign_id: u64,
        ad_link: Option<&str>,
        phones: &[String],
    ) -> Result<Vec<String>, CourierError>;

    /// Pushes aggregate delivery statistics for a campaign.
    async fn push_statistics(
        &self,
        token: &str,
        campaign_id: u64,
        statistics: &CampaignStatistics,
    ) -> Result<(), CourierError>;

    /// Creates short links in bulk.
    async fn create_short_links(
        &self,
        token: &str,
        links: &[ShortLinkRecord],
    ) -> Result<(), CourierError>;
}

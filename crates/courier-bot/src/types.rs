// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Control-plane request bodies and typed response envelopes.

use courier_core::{Campaign, CampaignStatistics, ShortLinkRecord};
use serde::{Deserialize, Serialize};

/// Envelope wrapping every control-plane response.
///
/// `data` is decoded straight into the endpoint's payload type.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub session: SessionData,
}

#[derive(Debug, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct CampaignList {
    #[serde(default)]
    pub items: Vec<Campaign>,
}

#[derive(Debug, Serialize)]
pub struct AllocateShortLinksRequest<'a> {
    pub campaign_id: u64,
    pub ad_link: Option<&'a str>,
    pub phones: &'a [String],
    pub short_link_domain: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct AllocatedCodes {
    #[serde(default)]
    pub codes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StatisticsRequest<'a> {
    pub statistics: &'a CampaignStatistics,
}

#[derive(Debug, Serialize)]
pub struct CreateShortLinksRequest<'a> {
    pub items: &'a [ShortLinkRecord],
}

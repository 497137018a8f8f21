// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PayamSMS wire types.

use serde::{Deserialize, Serialize};

/// Body of `sendMultipleWithSrc`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest<'a> {
    pub sender: &'a str,
    pub sms_items: Vec<SmsItem<'a>>,
}

/// One recipient in a send request. `customer_id` carries the tracking ID.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsItem<'a> {
    pub recipient: &'a str,
    pub body: &'a str,
    pub customer_id: &'a str,
    pub send_date: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
}

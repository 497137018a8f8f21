// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMS gateway trait for the outbound message provider.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::{DeliveryReport, OutboundSms, SendAck};

/// Adapter for the SMS provider that delivers messages and reports status.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Obtains a fresh provider access token.
    async fn get_token(&self) -> Result<String, CourierError>;

    /// Sends a batch of messages from `sender`, one acknowledgement per item.
    ///
    /// Implementations authenticate on their own for each call.
    async fn send_batch(
        &self,
        sender: &str,
        items: &[OutboundSms],
    ) -> Result<Vec<SendAck>, CourierError>;

    /// Queries delivery status for the given tracking IDs.
    async fn fetch_status(
        &self,
        token: &str,
        tracking_ids: &[String],
    ) -> Result<Vec<DeliveryReport>, CourierError>;
}

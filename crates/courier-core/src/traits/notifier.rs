// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator notification trait.

use async_trait::async_trait;

use crate::error::CourierError;

/// Side channel used to alert an operator about scheduler failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends a plain-text SMS to `to`.
    async fn send_sms(&self, to: &str, message: &str) -> Result<(), CourierError>;
}

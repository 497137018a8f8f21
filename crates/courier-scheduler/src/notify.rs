// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort operator alerts.

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{CourierError, Notifier, OutboundSms, SmsGateway, SmsStatus};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Sends failure alerts to the configured admin mobile.
///
/// Alerts never block or fail the caller: each one is sent from its own
/// task and a failed send is only logged.
#[derive(Clone, Default)]
pub struct AdminAlerter {
    mobile: Option<String>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl AdminAlerter {
    pub fn new(mobile: Option<String>, notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self {
            mobile: mobile.filter(|m| !m.trim().is_empty()),
            notifier,
        }
    }

    /// An alerter that drops every alert.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Send `message` in the background. Returns the send task, if any.
    pub fn alert(&self, message: impl Into<String>) -> Option<JoinHandle<()>> {
        let message = message.into();
        let (Some(mobile), Some(notifier)) = (self.mobile.clone(), self.notifier.clone()) else {
            debug!(%message, "admin alert dropped, no admin mobile or notifier configured");
            return None;
        };
        Some(tokio::spawn(async move {
            if let Err(e) = notifier.send_sms(&mobile, &message).await {
                warn!(error = %e, "failed to deliver admin alert");
            }
        }))
    }
}

/// [`Notifier`] that delivers alerts through the SMS gateway.
pub struct SmsNotifier {
    gateway: Arc<dyn SmsGateway>,
    sender: String,
}

impl SmsNotifier {
    pub fn new(gateway: Arc<dyn SmsGateway>, sender: impl Into<String>) -> Self {
        Self {
            gateway,
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn send_sms(&self, to: &str, message: &str) -> Result<(), CourierError> {
        let item = OutboundSms {
            recipient: to.to_string(),
            body: message.to_string(),
            tracking_id: format!("alert-{}", Uuid::new_v4().simple()),
        };
        let acks = self
            .gateway
            .send_batch(&self.sender, std::slice::from_ref(&item))
            .await?;
        match acks.first() {
            Some(ack) if ack.outcome() == SmsStatus::Sent => Ok(()),
            Some(ack) => Err(CourierError::Api {
                service: "sms-provider",
                message: format!(
                    "alert rejected: {}",
                    ack.description.as_deref().unwrap_or("no description")
                ),
            }),
            None => Err(CourierError::Api {
                service: "sms-provider",
                message: "alert send returned no acknowledgement".into(),
            }),
        }
    }
}

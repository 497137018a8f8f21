// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock SMS gateway for deterministic scheduler tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_core::{CourierError, DeliveryReport, OutboundSms, SendAck, SmsGateway};

/// Token returned by a successful mock token request.
pub const MOCK_SMS_TOKEN: &str = "mock-sms-token";

/// A mock SMS gateway.
///
/// Every message is acknowledged with a server ID unless its recipient was
/// registered with [`reject_recipient`](Self::reject_recipient). Status
/// queries report every tracking ID as one fully delivered part.
#[derive(Default)]
pub struct MockSmsGateway {
    sends: Mutex<Vec<(String, Vec<OutboundSms>)>>,
    status_queries: Mutex<Vec<Vec<String>>>,
    rejected: Mutex<HashSet<String>>,
    failing_batches: Mutex<HashSet<usize>>,
    batch_counter: AtomicUsize,
    token_requests: AtomicUsize,
    fail_token: AtomicBool,
    fail_send: AtomicBool,
    fail_status: AtomicBool,
    reverse_reports: AtomicBool,
}

impl MockSmsGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acknowledge messages to `recipient` with an error code.
    pub async fn reject_recipient(&self, recipient: &str) {
        self.rejected.lock().await.insert(recipient.to_string());
    }

    /// Fail the `index`-th (0-based) send call with a transport error.
    pub async fn fail_batch(&self, index: usize) {
        self.failing_batches.lock().await.insert(index);
    }

    pub fn set_fail_token(&self, fail: bool) {
        self.fail_token.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_status(&self, fail: bool) {
        self.fail_status.store(fail, Ordering::SeqCst);
    }

    /// Return status reports in reverse order of the requested IDs.
    pub fn set_reverse_reports(&self, reverse: bool) {
        self.reverse_reports.store(reverse, Ordering::SeqCst);
    }

    /// All send calls, as `(sender, items)`.
    pub async fn sends(&self) -> Vec<(String, Vec<OutboundSms>)> {
        self.sends.lock().await.clone()
    }

    /// Every message passed to `send_batch`, flattened in call order.
    pub async fn sent_messages(&self) -> Vec<OutboundSms> {
        self.sends
            .lock()
            .await
            .iter()
            .flat_map(|(_, items)| items.iter().cloned())
            .collect()
    }

    pub async fn status_queries(&self) -> Vec<Vec<String>> {
        self.status_queries.lock().await.clone()
    }

    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SmsGateway for MockSmsGateway {
    async fn get_token(&self) -> Result<String, CourierError> {
        self.token_requests.fetch_add(1, Ordering::SeqCst);
        if self.fail_token.load(Ordering::SeqCst) {
            return Err(CourierError::Api {
                service: "sms-provider",
                message: "mock token failure".into(),
            });
        }
        Ok(MOCK_SMS_TOKEN.to_string())
    }

    async fn send_batch(
        &self,
        sender: &str,
        items: &[OutboundSms],
    ) -> Result<Vec<SendAck>, CourierError> {
        let index = self.batch_counter.fetch_add(1, Ordering::SeqCst);
        self.sends
            .lock()
            .await
            .push((sender.to_string(), items.to_vec()));

        let failing = self.failing_batches.lock().await.contains(&index);
        if self.fail_send.load(Ordering::SeqCst) || failing {
            return Err(CourierError::Transport {
                service: "sms-provider",
                message: format!("mock send failure for batch {index}"),
                source: None,
            });
        }

        let rejected = self.rejected.lock().await;
        Ok(items
            .iter()
            .map(|item| {
                let reject = rejected.contains(&item.recipient);
                SendAck {
                    tracking_id: item.tracking_id.clone(),
                    mobile: Some(item.recipient.clone()),
                    server_id: (!reject).then(|| format!("srv-{}", item.tracking_id)),
                    error_code: reject.then(|| "14".to_string()),
                    description: reject.then(|| "recipient blocked".to_string()),
                }
            })
            .collect())
    }

    async fn fetch_status(
        &self,
        _token: &str,
        tracking_ids: &[String],
    ) -> Result<Vec<DeliveryReport>, CourierError> {
        self.status_queries.lock().await.push(tracking_ids.to_vec());
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(CourierError::Api {
                service: "sms-provider",
                message: "mock status failure".into(),
            });
        }

        let mut reports: Vec<DeliveryReport> = tracking_ids
            .iter()
            .map(|id| DeliveryReport {
                tracking_id: id.clone(),
                server_id: Some(format!("srv-{id}")),
                total_parts: 1,
                total_delivered_parts: 1,
                total_undelivered_parts: 0,
                total_unknown_parts: 0,
                status: "delivered".into(),
            })
            .collect();
        if self.reverse_reports.load(Ordering::SeqCst) {
            reports.reverse();
        }
        Ok(reports)
    }
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock operator notifier that captures alerts.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_core::{CourierError, Notifier};

#[derive(Default)]
pub struct MockNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured `(to, message)` pairs.
    pub async fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().await.clone()
    }

    /// Wait until at least `count` alerts arrived, or `timeout` elapses.
    ///
    /// Alerts are sent from spawned tasks, so tests poll for them.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<(String, String)> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let messages = self.messages().await;
            if messages.len() >= count || tokio::time::Instant::now() >= deadline {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_sms(&self, to: &str, message: &str) -> Result<(), CourierError> {
        self.messages
            .lock()
            .await
            .push((to.to_string(), message.to_string()));
        Ok(())
    }
}

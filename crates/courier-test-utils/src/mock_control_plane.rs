// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock control plane for deterministic scheduler tests.
//!
//! `MockControlPlane` serves a configurable list of ready campaigns, hands
//! out sequential short-link codes, and records every call so tests can
//! assert on the exact interaction sequence.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};

use courier_core::{Campaign, CampaignStatistics, ControlPlane, CourierError, ShortLinkRecord};

/// Token returned by a successful mock login.
pub const MOCK_BOT_TOKEN: &str = "mock-bot-token";

/// One recorded control-plane interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPlaneCall {
    Login,
    ListReady,
    Running(u64),
    Executed(u64),
    AllocateShortLinks {
        campaign_id: u64,
        phones: Vec<String>,
    },
    PushStatistics {
        campaign_id: u64,
        statistics: CampaignStatistics,
    },
    CreateShortLinks(usize),
}

/// A mock control plane.
///
/// Operations can be made to fail by name (`login`, `list_ready`, `running`,
/// `executed`, `allocate`, `statistics`, `create_short_links`).
#[derive(Default)]
pub struct MockControlPlane {
    campaigns: Mutex<Vec<Campaign>>,
    calls: Mutex<Vec<ControlPlaneCall>>,
    failures: Mutex<HashSet<&'static str>>,
    running_gate: Mutex<Option<Arc<Semaphore>>>,
    next_code: AtomicUsize,
}

impl MockControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock serving the given ready campaigns.
    pub fn with_campaigns(campaigns: Vec<Campaign>) -> Self {
        Self {
            campaigns: Mutex::new(campaigns),
            ..Self::default()
        }
    }

    /// Replace the ready-campaign list.
    pub async fn set_campaigns(&self, campaigns: Vec<Campaign>) {
        *self.campaigns.lock().await = campaigns;
    }

    /// Make the named operation fail until [`recover`](Self::recover) is called.
    pub async fn fail(&self, op: &'static str) {
        self.failures.lock().await.insert(op);
    }

    pub async fn recover(&self, op: &'static str) {
        self.failures.lock().await.remove(op);
    }

    /// Hold every `move_to_running` call until permits are added to the
    /// returned semaphore.
    pub async fn pause_running(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.running_gate.lock().await = Some(gate.clone());
        gate
    }

    /// Snapshot of all recorded calls, in order.
    pub async fn calls(&self) -> Vec<ControlPlaneCall> {
        self.calls.lock().await.clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub async fn count(&self, predicate: impl Fn(&ControlPlaneCall) -> bool) -> usize {
        self.calls.lock().await.iter().filter(|c| predicate(c)).count()
    }

    /// Statistics pushed so far, in order.
    pub async fn pushed_statistics(&self) -> Vec<(u64, CampaignStatistics)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                ControlPlaneCall::PushStatistics {
                    campaign_id,
                    statistics,
                } => Some((*campaign_id, statistics.clone())),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: ControlPlaneCall, op: &'static str) -> Result<(), CourierError> {
        self.calls.lock().await.push(call);
        if self.failures.lock().await.contains(op) {
            return Err(CourierError::Api {
                service: "control-plane",
                message: format!("mock {op} failure"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn login(&self) -> Result<String, CourierError> {
        self.record(ControlPlaneCall::Login, "login").await?;
        Ok(MOCK_BOT_TOKEN.to_string())
    }

    async fn list_ready_campaigns(&self, _token: &str) -> Result<Vec<Campaign>, CourierError> {
        self.record(ControlPlaneCall::ListReady, "list_ready").await?;
        Ok(self.campaigns.lock().await.clone())
    }

    async fn move_to_running(&self, _token: &str, campaign_id: u64) -> Result<(), CourierError> {
        let gate = self.running_gate.lock().await.clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }
        self.record(ControlPlaneCall::Running(campaign_id), "running")
            .await
    }

    async fn move_to_executed(&self, _token: &str, campaign_id: u64) -> Result<(), CourierError> {
        self.record(ControlPlaneCall::Executed(campaign_id), "executed")
            .await
    }

    async fn allocate_short_links(
        &self,
        _token: &str,
        campaign_id: u64,
        _ad_link: Option<&str>,
        phones: &[String],
    ) -> Result<Vec<String>, CourierError> {
        self.record(
            ControlPlaneCall::AllocateShortLinks {
                campaign_id,
                phones: phones.to_vec(),
            },
            "allocate",
        )
        .await?;
        Ok(phones
            .iter()
            .map(|_| format!("c{:05}", self.next_code.fetch_add(1, Ordering::SeqCst)))
            .collect())
    }

    async fn push_statistics(
        &self,
        _token: &str,
        campaign_id: u64,
        statistics: &CampaignStatistics,
    ) -> Result<(), CourierError> {
        self.record(
            ControlPlaneCall::PushStatistics {
                campaign_id,
                statistics: statistics.clone(),
            },
            "statistics",
        )
        .await
    }

    async fn create_short_links(
        &self,
        _token: &str,
        links: &[ShortLinkRecord],
    ) -> Result<(), CourierError> {
        self.record(
            ControlPlaneCall::CreateShortLinks(links.len()),
            "create_short_links",
        )
        .await
    }
}

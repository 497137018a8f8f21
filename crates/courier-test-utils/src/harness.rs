// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for scheduler integration tests.
//!
//! `TestHarness` owns a temp-dir SQLite database, a configuration tuned for
//! tests, and the three mock collaborators. Seeding helpers create tags and
//! audience profiles so selection runs against real queries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Duration, Utc};
use courier_config::CourierConfig;
use courier_core::types::CAMPAIGN_STATUS_APPROVED;
use courier_core::{Campaign, CourierError, ProfileColor};
use courier_storage::Database;
use courier_storage::queries::audience;

use crate::mock_control_plane::MockControlPlane;
use crate::mock_gateway::MockSmsGateway;
use crate::mock_notifier::MockNotifier;

/// Admin mobile configured by default in harness configs.
pub const ADMIN_MOBILE: &str = "09120000000";

/// A ready-to-dispatch campaign targeting `tags`.
///
/// Approved, timestamped an hour ago, sender line `3000`, with an ad-link and
/// a content template containing the link placeholder.
pub fn ready_campaign(id: u64, customer_id: u64, tags: &[i64], num_audiences: u32) -> Campaign {
    let an_hour_ago = Utc::now() - Duration::hours(1);
    Campaign {
        id,
        customer_id,
        status: CAMPAIGN_STATUS_APPROVED.to_string(),
        created_at: an_hour_ago,
        updated_at: an_hour_ago,
        title: Some(format!("campaign {id}")),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ad_link: Some("https://shop.example/sale".into()),
        content: Some("Spring sale \u{1F517}".into()),
        schedule_at: Some(an_hour_ago),
        line_number: Some("3000".into()),
        budget: None,
        comment: None,
        num_audiences,
    }
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: CourierConfig,
    campaigns: Vec<Campaign>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = CourierConfig::default();
        config.admin.mobile = Some(ADMIN_MOBILE.to_string());
        config.admin.sender = Some("3000".to_string());
        Self {
            config,
            campaigns: Vec::new(),
        }
    }

    /// Set the per-request batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.scheduler.batch_size = batch_size;
        self
    }

    /// Campaigns the mock control plane lists as ready.
    pub fn with_campaigns(mut self, campaigns: Vec<Campaign>) -> Self {
        self.campaigns = campaigns;
        self
    }

    /// Apply an arbitrary configuration tweak.
    pub fn configure(mut self, f: impl FnOnce(&mut CourierConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Build the harness, opening and migrating a fresh database.
    pub async fn build(mut self) -> Result<TestHarness, CourierError> {
        let temp_dir = tempfile::TempDir::new().map_err(CourierError::storage)?;
        let db_path = temp_dir.path().join("courier-test.db");
        self.config.storage.database_path = db_path.to_string_lossy().to_string();

        let db = Database::open(&self.config.storage.database_path).await?;

        Ok(TestHarness {
            db,
            config: self.config,
            control: Arc::new(MockControlPlane::with_campaigns(self.campaigns)),
            gateway: Arc::new(MockSmsGateway::new()),
            notifier: Arc::new(MockNotifier::new()),
            next_phone: AtomicU64::new(1),
            phones: StdMutex::new(HashMap::new()),
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment: database, config and mock collaborators.
pub struct TestHarness {
    pub db: Database,
    pub config: CourierConfig,
    pub control: Arc<MockControlPlane>,
    pub gateway: Arc<MockSmsGateway>,
    pub notifier: Arc<MockNotifier>,
    next_phone: AtomicU64,
    phones: StdMutex<HashMap<i64, String>>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Build with default settings.
    pub async fn new() -> Result<Self, CourierError> {
        Self::builder().build().await
    }

    /// Insert (or reactivate) a tag.
    pub async fn seed_tag(&self, id: i64) -> Result<(), CourierError> {
        audience::upsert_tag(&self.db, id, &format!("tag-{id}"), true).await
    }

    /// Insert `count` profiles of `color` tagged `tag_id`, each with a unique
    /// phone number. Returns the new profile IDs in insertion order.
    pub async fn seed_profiles(
        &self,
        tag_id: i64,
        color: ProfileColor,
        count: usize,
    ) -> Result<Vec<i64>, CourierError> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let n = self.next_phone.fetch_add(1, Ordering::SeqCst);
            let phone = format!("0935{n:07}");
            let id = audience::insert_profile(
                &self.db,
                &format!("uid-{n}"),
                Some(&phone),
                color,
                &[tag_id],
            )
            .await?;
            if let Ok(mut phones) = self.phones.lock() {
                phones.insert(id, phone);
            }
            ids.push(id);
        }
        Ok(ids)
    }

    /// Phone number of a profile seeded by this harness.
    pub fn phone_of(&self, profile_id: i64) -> Option<String> {
        self.phones
            .lock()
            .ok()
            .and_then(|phones| phones.get(&profile_id).cloned())
    }
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracking-ID allocation backed by the persistent sequence counter.

use courier_config::model::TrackingConfig;
use courier_core::CourierError;
use courier_storage::Database;
use courier_storage::queries::sequence;
use tracing::debug;

/// Hands out globally unique, strictly increasing message tracking IDs.
///
/// Every call is one `BEGIN IMMEDIATE` transaction on the counter row, so
/// concurrent campaigns (and other processes sharing the database file)
/// serialize on it and never observe the same value.
#[derive(Clone)]
pub struct TrackingAllocator {
    db: Database,
    counter_name: String,
    hex_width: usize,
}

impl TrackingAllocator {
    pub fn new(db: Database, config: &TrackingConfig) -> Self {
        Self {
            db,
            counter_name: config.counter_name.clone(),
            hex_width: config.hex_width,
        }
    }

    /// Allocate `count` consecutive IDs, zero-padded lowercase hex.
    pub async fn allocate(&self, count: usize) -> Result<Vec<String>, CourierError> {
        let ids = sequence::allocate(&self.db, &self.counter_name, count, self.hex_width).await?;
        if let (Some(first), Some(last)) = (ids.first(), ids.last()) {
            debug!(count, first = %first, last = %last, "tracking ids allocated");
        }
        Ok(ids)
    }
}

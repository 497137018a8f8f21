// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audience selection with per-(customer, tag set) history.
//!
//! Profiles already consumed by earlier campaigns of the same customer and
//! tag set are excluded. White profiles are preferred; pink ones fill the
//! remainder. When the fresh pool cannot satisfy the request, the selection
//! falls back to the whole pool and the history is reset to that snapshot.

use std::collections::HashSet;

use courier_core::{AudienceProfile, Campaign, CourierError, ProfileColor};
use courier_storage::models::{NewSelection, SelectionMode};
use courier_storage::queries::{audience, selections};
use courier_storage::Database;
use sha1::{Digest, Sha1};
use tracing::{debug, info};

/// Selection history key for a tag list: hex SHA-1 of the sorted,
/// comma-joined tag strings. An empty list yields an empty key.
pub fn tags_hash(tags: &[String]) -> String {
    if tags.is_empty() {
        return String::new();
    }
    let mut sorted: Vec<&str> = tags.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    hex::encode(Sha1::digest(sorted.join(",").as_bytes()))
}

/// Parse the campaign's tag strings as numeric tag IDs.
pub fn parse_tag_ids(campaign: &Campaign) -> Result<Vec<i64>, CourierError> {
    campaign
        .tags
        .iter()
        .map(|tag| {
            tag.trim().parse::<u32>().map(i64::from).map_err(|e| {
                CourierError::Validation(format!(
                    "campaign {} has non-numeric tag {tag:?}: {e}",
                    campaign.id
                ))
            })
        })
        .collect()
}

/// The recipients chosen for one campaign, not yet persisted.
#[derive(Debug, Clone)]
pub struct AudiencePlan {
    /// Phone numbers in selection order.
    pub phones: Vec<String>,
    /// Profile IDs, parallel to `phones`.
    pub ids: Vec<i64>,
    /// History row to persist together with the processed campaign.
    pub selection: NewSelection,
}

/// Picks recipients for a campaign from the tagged audience pool.
#[derive(Clone)]
pub struct AudienceSelector {
    db: Database,
}

impl AudienceSelector {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Select up to `num_audiences` recipients for `campaign`.
    ///
    /// Reads only; the returned plan's selection is persisted when the
    /// processed campaign is committed, provided the history it excluded is
    /// still the latest.
    pub async fn select(
        &self,
        campaign: &Campaign,
        correlation_id: &str,
    ) -> Result<AudiencePlan, CourierError> {
        let requested = parse_tag_ids(campaign)?;
        let tag_ids: Vec<i64> = audience::active_tags(&self.db, requested.clone())
            .await?
            .into_iter()
            .map(|tag| tag.id)
            .collect();
        debug!(
            campaign_id = campaign.id,
            requested = requested.len(),
            resolved = tag_ids.len(),
            "campaign tags resolved"
        );

        let key = tags_hash(&campaign.tags);
        let previous = selections::latest(&self.db, campaign.customer_id, &key).await?;
        let based_on = previous.as_ref().map(|s| s.id);
        let exclude: HashSet<i64> = previous
            .as_ref()
            .map(|s| s.audience_ids.iter().copied().collect())
            .unwrap_or_default();

        let target = campaign.num_audiences as usize;
        let mut picked = self.pick(&tag_ids, target, &exclude).await?;
        let mut mode = SelectionMode::Merge;

        if picked.len() < target {
            info!(
                campaign_id = campaign.id,
                fresh = picked.len(),
                requested = target,
                "fresh audience exhausted, reselecting from the full pool"
            );
            picked = self.pick(&tag_ids, target, &HashSet::new()).await?;
            mode = SelectionMode::Snapshot;
        }

        let (ids, phones): (Vec<i64>, Vec<String>) = picked
            .into_iter()
            .filter_map(|p| p.phone_number.map(|phone| (p.id, phone)))
            .unzip();
        info!(
            campaign_id = campaign.id,
            selected = ids.len(),
            requested = target,
            reset = mode == SelectionMode::Snapshot,
            "audience selected"
        );

        Ok(AudiencePlan {
            phones,
            selection: NewSelection {
                customer_id: campaign.customer_id,
                tags_hash: key,
                correlation_id: correlation_id.to_string(),
                audience_ids: ids.clone(),
                mode,
                based_on,
            },
            ids,
        })
    }

    /// White profiles first, then pink ones for whatever remains.
    async fn pick(
        &self,
        tag_ids: &[i64],
        target: usize,
        exclude: &HashSet<i64>,
    ) -> Result<Vec<AudienceProfile>, CourierError> {
        let mut picked =
            audience::select_profiles(&self.db, tag_ids, ProfileColor::White, exclude, target)
                .await?;
        if picked.len() < target {
            let pinks = audience::select_profiles(
                &self.db,
                tag_ids,
                ProfileColor::Pink,
                exclude,
                target - picked.len(),
            )
            .await?;
            picked.extend(pinks);
        }
        Ok(picked)
    }
}

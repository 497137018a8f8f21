// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Processed-campaign records: the at-most-once guard and checkpoint store.

use courier_core::CourierError;
use rusqlite::{ErrorCode, OptionalExtension, Row, TransactionBehavior, params};

use crate::database::Database;
use crate::models::{CampaignPlan, CampaignStatistics, PendingSms, ProcessedCampaign};
use crate::queries::{from_json, selections, sent, to_json};

const COLUMNS: &str = "id, campaign_id, campaign_json, audience_ids, audience_codes,
     last_audience_id, audience_selection_id, statistics, created_at, updated_at";

fn row_to_processed(row: &Row<'_>) -> rusqlite::Result<ProcessedCampaign> {
    let campaign_id: i64 = row.get(1)?;
    let statistics: Option<String> = row.get(7)?;
    Ok(ProcessedCampaign {
        id: row.get(0)?,
        campaign_id: campaign_id as u64,
        campaign_json: row.get(2)?,
        audience_ids: from_json(3, row.get(3)?)?,
        audience_codes: from_json(4, row.get(4)?)?,
        last_audience_id: row.get(5)?,
        audience_selection_id: row.get(6)?,
        statistics: statistics.map(|s| from_json(7, s)).transpose()?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Whether a processed-campaign row exists for this control-plane campaign.
pub async fn exists(db: &Database, campaign_id: u64) -> Result<bool, CourierError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM processed_campaigns WHERE campaign_id = ?1)",
                params![campaign_id as i64],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a processed campaign by its own ID.
pub async fn get(db: &Database, id: i64) -> Result<Option<ProcessedCampaign>, CourierError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM processed_campaigns WHERE id = ?1"),
                params![id],
                row_to_processed,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a processed campaign by the control-plane campaign ID.
pub async fn get_by_campaign_id(
    db: &Database,
    campaign_id: u64,
) -> Result<Option<ProcessedCampaign>, CourierError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM processed_campaigns WHERE campaign_id = ?1"),
                params![campaign_id as i64],
                row_to_processed,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Count processed-campaign rows for a campaign (0 or 1 by construction).
pub async fn count_for_campaign(db: &Database, campaign_id: u64) -> Result<i64, CourierError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM processed_campaigns WHERE campaign_id = ?1",
                params![campaign_id as i64],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Commit a campaign plan atomically.
///
/// In one transaction: insert the processed-campaign row, persist the audience
/// selection (merged with or replacing the latest one), and store the chosen
/// IDs, codes and selection reference on the row. A concurrent or earlier
/// commit for the same campaign surfaces as `CourierError::AlreadyProcessed`
/// and nothing is written.
///
/// The transaction takes the write lock up front. If the latest selection for
/// the plan's key is no longer the one it was built on, nothing is written
/// and `CourierError::SelectionConflict` is returned so the caller can
/// re-plan.
pub async fn commit_plan(
    db: &Database,
    plan: CampaignPlan,
) -> Result<ProcessedCampaign, CourierError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let inserted = tx.execute(
                "INSERT INTO processed_campaigns (campaign_id, campaign_json) VALUES (?1, ?2)",
                params![plan.campaign_id as i64, plan.campaign_json],
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    return Ok(Err(CourierError::AlreadyProcessed {
                        campaign_id: plan.campaign_id,
                    }));
                }
                Err(e) => return Err(e),
            }
            let processed_id = tx.last_insert_rowid();

            let current = selections::latest_in(
                &tx,
                plan.selection.customer_id,
                &plan.selection.tags_hash,
            )?
            .map(|s| s.id);
            if current != plan.selection.based_on {
                return Ok(Err(CourierError::SelectionConflict {
                    customer_id: plan.selection.customer_id,
                }));
            }

            let selection = selections::persist_in(&tx, &plan.selection)?;

            tx.execute(
                "UPDATE processed_campaigns
                 SET audience_ids = ?2, audience_codes = ?3, audience_selection_id = ?4,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![
                    processed_id,
                    to_json(&plan.audience_ids)?,
                    to_json(&plan.audience_codes)?,
                    selection.id
                ],
            )?;

            let processed = tx.query_row(
                &format!("SELECT {COLUMNS} FROM processed_campaigns WHERE id = ?1"),
                params![processed_id],
                row_to_processed,
            )?;
            tx.commit()?;
            Ok(Ok(processed))
        })
        .await
        .map_err(crate::database::map_tr_err)?
}

/// Persist a batch of pending messages and advance the checkpoint, atomically.
pub async fn record_pending_batch(
    db: &Database,
    processed_campaign_id: i64,
    messages: Vec<PendingSms>,
    last_audience_id: i64,
) -> Result<(), CourierError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            sent::insert_pending_in(&tx, processed_campaign_id, &messages)?;
            tx.execute(
                "UPDATE processed_campaigns
                 SET last_audience_id = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![processed_campaign_id, last_audience_id],
            )?;
            tx.commit()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Overwrite the statistics blob on a processed campaign.
pub(crate) fn set_statistics_in(
    conn: &rusqlite::Connection,
    processed_campaign_id: i64,
    statistics: &CampaignStatistics,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE processed_campaigns
         SET statistics = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?1",
        params![processed_campaign_id, to_json(statistics)?],
    )
}

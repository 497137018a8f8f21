// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery reports and the per-campaign aggregate derived from them.

use courier_core::{CourierError, DeliveryReport};
use rusqlite::params;

use crate::database::Database;
use crate::models::{CampaignStatistics, StatusResult};
use crate::queries::{campaigns, sent, status_jobs};

/// Outcome of recording one job's delivery reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedStatus {
    /// Control-plane ID of the campaign the job belongs to.
    pub campaign_id: u64,
    pub statistics: CampaignStatistics,
}

/// Record a successful status query for `job_id`, atomically.
///
/// Stores one result per (job, tracking ID), so every check keeps its own
/// snapshot; a repeated report within the same job replaces the earlier one.
/// Then copies delivered-part counts onto the sent-SMS rows, recomputes the
/// campaign aggregate, stores it on the processed campaign, and marks the job
/// executed.
pub async fn record_job_results(
    db: &Database,
    job_id: i64,
    processed_campaign_id: i64,
    reports: Vec<DeliveryReport>,
    updated_at: String,
) -> Result<RecordedStatus, CourierError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO sms_status_results
                         (job_id, processed_campaign_id, tracking_id, server_id, total_parts,
                          delivered_parts, undelivered_parts, unknown_parts, status)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT (job_id, tracking_id) DO UPDATE SET
                         server_id = excluded.server_id,
                         total_parts = excluded.total_parts,
                         delivered_parts = excluded.delivered_parts,
                         undelivered_parts = excluded.undelivered_parts,
                         unknown_parts = excluded.unknown_parts,
                         status = excluded.status,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                )?;
                for report in &reports {
                    stmt.execute(params![
                        job_id,
                        processed_campaign_id,
                        report.tracking_id,
                        report.server_id,
                        report.total_parts,
                        report.total_delivered_parts,
                        report.total_undelivered_parts,
                        report.total_unknown_parts,
                        report.status
                    ])?;
                    sent::set_parts_delivered_in(
                        &tx,
                        &report.tracking_id,
                        report.total_delivered_parts,
                    )?;
                }
            }

            let statistics = aggregate_in(&tx, processed_campaign_id, updated_at)?;
            campaigns::set_statistics_in(&tx, processed_campaign_id, &statistics)?;
            status_jobs::mark_executed_in(&tx, job_id)?;

            let campaign_id: i64 = tx.query_row(
                "SELECT campaign_id FROM processed_campaigns WHERE id = ?1",
                params![processed_campaign_id],
                |row| row.get(0),
            )?;
            tx.commit()?;
            Ok(RecordedStatus {
                campaign_id: campaign_id as u64,
                statistics,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Compute the aggregate statistics for a processed campaign.
///
/// Only the most recently recorded result of each message counts, so a
/// message checked at several offsets is counted once.
pub(crate) fn aggregate_in(
    conn: &rusqlite::Connection,
    processed_campaign_id: i64,
    updated_at: String,
) -> rusqlite::Result<CampaignStatistics> {
    let records: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sent_sms WHERE processed_campaign_id = ?1",
        params![processed_campaign_id],
        |row| row.get(0),
    )?;
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(total_parts), 0),
                COALESCE(SUM(delivered_parts), 0),
                COALESCE(SUM(undelivered_parts), 0),
                COALESCE(SUM(unknown_parts), 0)
         FROM sms_status_results r
         WHERE r.processed_campaign_id = ?1
           AND r.id = (SELECT MAX(l.id) FROM sms_status_results l
                       WHERE l.processed_campaign_id = r.processed_campaign_id
                         AND l.tracking_id = r.tracking_id)",
        params![processed_campaign_id],
        |row| {
            Ok(CampaignStatistics {
                aggregated_total_records: records,
                aggregated_total_sent: row.get(0)?,
                aggregated_total_parts: row.get(1)?,
                aggregated_total_delivered_parts: row.get(2)?,
                aggregated_total_undelivered_parts: row.get(3)?,
                aggregated_total_unknown_parts: row.get(4)?,
                updated_at,
            })
        },
    )
}

/// All results for a processed campaign, by tracking ID then job.
pub async fn list_for_campaign(
    db: &Database,
    processed_campaign_id: i64,
) -> Result<Vec<StatusResult>, CourierError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, job_id, processed_campaign_id, tracking_id, server_id, total_parts,
                        delivered_parts, undelivered_parts, unknown_parts, status
                 FROM sms_status_results
                 WHERE processed_campaign_id = ?1
                 ORDER BY tracking_id ASC, job_id ASC",
            )?;
            let rows = stmt.query_map(params![processed_campaign_id], |row| {
                Ok(StatusResult {
                    id: row.get(0)?,
                    job_id: row.get(1)?,
                    processed_campaign_id: row.get(2)?,
                    tracking_id: row.get(3)?,
                    server_id: row.get(4)?,
                    total_parts: row.get(5)?,
                    delivered_parts: row.get(6)?,
                    undelivered_parts: row.get(7)?,
                    unknown_parts: row.get(8)?,
                    status: row.get(9)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

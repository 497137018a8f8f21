// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delayed delivery-status recheck jobs.

use courier_core::CourierError;
use rusqlite::{Row, params};

use crate::database::Database;
use crate::models::StatusJob;
use crate::queries::{from_json, to_json};

const COLUMNS: &str = "id, processed_campaign_id, correlation_id, tracking_ids, retry_count,
     scheduled_at, executed_at, error, created_at";

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<StatusJob> {
    Ok(StatusJob {
        id: row.get(0)?,
        processed_campaign_id: row.get(1)?,
        correlation_id: row.get(2)?,
        tracking_ids: from_json(3, row.get(3)?)?,
        retry_count: row.get(4)?,
        scheduled_at: row.get(5)?,
        executed_at: row.get(6)?,
        error: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Insert one job per entry of `scheduled_at`, all sharing `correlation_id`.
pub async fn schedule(
    db: &Database,
    processed_campaign_id: i64,
    correlation_id: &str,
    tracking_ids: Vec<String>,
    scheduled_at: Vec<String>,
) -> Result<Vec<i64>, CourierError> {
    let correlation_id = correlation_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let ids_json = to_json(&tracking_ids)?;
            let mut ids = Vec::with_capacity(scheduled_at.len());
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO sms_status_jobs
                         (processed_campaign_id, correlation_id, tracking_ids, scheduled_at)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for at in &scheduled_at {
                    stmt.execute(params![processed_campaign_id, correlation_id, ids_json, at])?;
                    ids.push(tx.last_insert_rowid());
                }
            }
            tx.commit()?;
            Ok(ids)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Jobs due at `now` that have not run and are below the retry limit,
/// oldest first, at most `limit`.
pub async fn list_due(
    db: &Database,
    now: &str,
    max_retries: u32,
    limit: usize,
) -> Result<Vec<StatusJob>, CourierError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM sms_status_jobs
                 WHERE scheduled_at <= ?1 AND executed_at IS NULL AND retry_count < ?2
                 ORDER BY scheduled_at ASC, id ASC
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![now, max_retries, limit as i64], row_to_job)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a failed attempt: bump the retry count, store the error, and mark
/// the job executed so it is not picked up again.
pub async fn mark_failed(db: &Database, job_id: i64, error: &str) -> Result<(), CourierError> {
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sms_status_jobs
                 SET retry_count = retry_count + 1, error = ?2,
                     executed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![job_id, error],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a job executed successfully, clearing any previous error.
pub(crate) fn mark_executed_in(
    conn: &rusqlite::Connection,
    job_id: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE sms_status_jobs
         SET executed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), error = NULL,
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?1",
        params![job_id],
    )
}

/// Fetch a job by ID.
pub async fn get(db: &Database, job_id: i64) -> Result<Option<StatusJob>, CourierError> {
    use rusqlite::OptionalExtension;
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM sms_status_jobs WHERE id = ?1"),
                params![job_id],
                row_to_job,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All jobs for a processed campaign, by ID.
pub async fn list_for_campaign(
    db: &Database,
    processed_campaign_id: i64,
) -> Result<Vec<StatusJob>, CourierError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM sms_status_jobs
                 WHERE processed_campaign_id = ?1 ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map(params![processed_campaign_id], row_to_job)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sent-SMS rows: one per recipient per campaign run.

use std::str::FromStr;

use courier_core::{CourierError, SendAck};
use rusqlite::{Row, params};

use crate::database::Database;
use crate::models::{PendingSms, SentSms, SmsStatus};

fn row_to_sent(row: &Row<'_>) -> rusqlite::Result<SentSms> {
    let status: String = row.get(5)?;
    Ok(SentSms {
        id: row.get(0)?,
        processed_campaign_id: row.get(1)?,
        phone_number: row.get(2)?,
        tracking_id: row.get(3)?,
        parts_delivered: row.get(4)?,
        status: SmsStatus::from_str(&status).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?,
        server_id: row.get(6)?,
        error_code: row.get(7)?,
        description: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Insert pending rows for a batch, preserving batch order in row IDs.
pub(crate) fn insert_pending_in(
    conn: &rusqlite::Connection,
    processed_campaign_id: i64,
    messages: &[PendingSms],
) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO sent_sms (processed_campaign_id, phone_number, tracking_id, status)
         VALUES (?1, ?2, ?3, 'pending')",
    )?;
    for msg in messages {
        stmt.execute(params![
            processed_campaign_id,
            msg.phone_number,
            msg.tracking_id
        ])?;
    }
    Ok(())
}

/// Apply provider acknowledgements to their rows, matched by tracking ID.
///
/// Returns the number of rows updated. Acks for unknown tracking IDs are
/// ignored.
pub async fn apply_acks(db: &Database, acks: Vec<SendAck>) -> Result<usize, CourierError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut updated = 0;
            {
                let mut stmt = tx.prepare_cached(
                    "UPDATE sent_sms
                     SET server_id = ?2, error_code = ?3, description = ?4, status = ?5,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE tracking_id = ?1",
                )?;
                for ack in &acks {
                    updated += stmt.execute(params![
                        ack.tracking_id,
                        ack.server_id,
                        ack.error_code,
                        ack.description,
                        ack.outcome().to_string()
                    ])?;
                }
            }
            tx.commit()?;
            Ok(updated)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the delivered-part count reported for a message.
pub(crate) fn set_parts_delivered_in(
    conn: &rusqlite::Connection,
    tracking_id: &str,
    parts_delivered: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE sent_sms
         SET parts_delivered = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE tracking_id = ?1",
        params![tracking_id, parts_delivered],
    )
}

/// All rows for a processed campaign in insertion order.
pub async fn list_for_campaign(
    db: &Database,
    processed_campaign_id: i64,
) -> Result<Vec<SentSms>, CourierError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, processed_campaign_id, phone_number, tracking_id, parts_delivered,
                        status, server_id, error_code, description, created_at, updated_at
                 FROM sent_sms WHERE processed_campaign_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![processed_campaign_id], row_to_sent)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Total number of sent-SMS rows across all campaigns.
pub async fn count_all(db: &Database) -> Result<i64, CourierError> {
    db.connection()
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM sent_sms", [], |row| row.get(0)))
        .await
        .map_err(crate::database::map_tr_err)
}

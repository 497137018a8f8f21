// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audience-selection history keyed by (customer, tags hash).

use courier_core::CourierError;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::Database;
use crate::models::{AudienceSelection, NewSelection, SelectionMode};
use crate::queries::{from_json, to_json};

fn row_to_selection(row: &Row<'_>) -> rusqlite::Result<AudienceSelection> {
    let customer_id: i64 = row.get(1)?;
    Ok(AudienceSelection {
        id: row.get(0)?,
        customer_id: customer_id as u64,
        tags_hash: row.get(2)?,
        correlation_id: row.get(3)?,
        audience_ids: from_json(4, row.get(4)?)?,
        created_at: row.get(5)?,
    })
}

/// The most recent selection for a key, if any.
pub(crate) fn latest_in(
    conn: &rusqlite::Connection,
    customer_id: u64,
    tags_hash: &str,
) -> rusqlite::Result<Option<AudienceSelection>> {
    conn.query_row(
        "SELECT id, customer_id, tags_hash, correlation_id, audience_ids, created_at
         FROM audience_selections
         WHERE customer_id = ?1 AND tags_hash = ?2
         ORDER BY created_at DESC, id DESC
         LIMIT 1",
        params![customer_id as i64, tags_hash],
        row_to_selection,
    )
    .optional()
}

/// The most recent selection for (customer, tags hash), if any.
pub async fn latest(
    db: &Database,
    customer_id: u64,
    tags_hash: &str,
) -> Result<Option<AudienceSelection>, CourierError> {
    let tags_hash = tags_hash.to_string();
    db.connection()
        .call(move |conn| latest_in(conn, customer_id, &tags_hash))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a new selection row.
///
/// In [`SelectionMode::Merge`] the stored IDs are the union with the latest
/// row for the same key; in [`SelectionMode::Snapshot`] only the new IDs.
/// Either way they are de-duplicated and sorted ascending.
pub(crate) fn persist_in(
    conn: &rusqlite::Connection,
    selection: &NewSelection,
) -> rusqlite::Result<AudienceSelection> {
    let mut ids = selection.audience_ids.clone();
    if selection.mode == SelectionMode::Merge
        && let Some(prior) = latest_in(conn, selection.customer_id, &selection.tags_hash)?
    {
        ids.extend(prior.audience_ids);
    }
    ids.sort_unstable();
    ids.dedup();

    conn.execute(
        "INSERT INTO audience_selections (customer_id, tags_hash, correlation_id, audience_ids)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            selection.customer_id as i64,
            selection.tags_hash,
            selection.correlation_id,
            to_json(&ids)?
        ],
    )?;
    let id = conn.last_insert_rowid();
    conn.query_row(
        "SELECT id, customer_id, tags_hash, correlation_id, audience_ids, created_at
         FROM audience_selections WHERE id = ?1",
        params![id],
        row_to_selection,
    )
}

/// Persist a selection outside any campaign transaction. `based_on` is not
/// checked here.
pub async fn persist(
    db: &Database,
    selection: NewSelection,
) -> Result<AudienceSelection, CourierError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let row = persist_in(&tx, &selection)?;
            tx.commit()?;
            Ok(row)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

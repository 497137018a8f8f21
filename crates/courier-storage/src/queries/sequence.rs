// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent named sequence counters for tracking-ID allocation.
//!
//! Each allocation runs in a `BEGIN IMMEDIATE` transaction, which takes the
//! database write lock up front. That lock is the serialization point for
//! every allocator sharing the database file, across tasks and processes.

use courier_core::CourierError;
use rusqlite::{OptionalExtension, TransactionBehavior, params};

use crate::database::Database;

/// Widest counter representable by the in-memory arithmetic.
const MAX_HEX_WIDTH: usize = 32;

/// Allocate `count` consecutive values from the counter `name`.
///
/// The counter row is created holding zero when absent. Values are lowercase
/// hex, zero-padded to `hex_width`, and must fit in `hex_width * 4` bits; an
/// allocation that would exceed that fails with `CourierError::Allocation`
/// and leaves the counter untouched.
pub async fn allocate(
    db: &Database,
    name: &str,
    count: usize,
    hex_width: usize,
) -> Result<Vec<String>, CourierError> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let current: Option<String> = tx
                .query_row(
                    "SELECT last_value FROM sequence_counters WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;
            let current = match current {
                Some(value) => value,
                None => {
                    let zero = "0".repeat(hex_width.max(1));
                    tx.execute(
                        "INSERT INTO sequence_counters (name, last_value) VALUES (?1, ?2)",
                        params![name, zero],
                    )?;
                    zero
                }
            };

            let ids = match next_values(&current, count, hex_width) {
                Ok(ids) => ids,
                // Dropping `tx` rolls back the insert above.
                Err(e) => return Ok(Err(e)),
            };

            tx.execute(
                "UPDATE sequence_counters
                 SET last_value = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE name = ?1",
                params![name, ids.last()],
            )?;
            tx.commit()?;
            Ok(Ok(ids))
        })
        .await
        .map_err(crate::database::map_tr_err)?
}

/// Read the last issued value of a counter without modifying it.
pub async fn current(db: &Database, name: &str) -> Result<Option<String>, CourierError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT last_value FROM sequence_counters WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The `count` values following `current`, formatted to `hex_width` digits.
pub fn next_values(
    current: &str,
    count: usize,
    hex_width: usize,
) -> Result<Vec<String>, CourierError> {
    if hex_width == 0 || hex_width > MAX_HEX_WIDTH {
        return Err(CourierError::Allocation(format!(
            "unsupported counter width {hex_width}"
        )));
    }
    let max_bits = (hex_width * 4) as u32;

    let digits = current.trim().to_ascii_lowercase();
    let digits = if digits.is_empty() { "0" } else { digits.as_str() };
    let mut value = u128::from_str_radix(digits, 16).map_err(|e| {
        CourierError::Allocation(format!("corrupt counter value {current:?}: {e}"))
    })?;
    if bit_len(value) > max_bits {
        return Err(CourierError::Allocation(format!(
            "counter value {current:?} exceeds {max_bits} bits"
        )));
    }

    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        value = value
            .checked_add(1)
            .filter(|v| bit_len(*v) <= max_bits)
            .ok_or_else(|| CourierError::Allocation("tracking counter overflow".to_string()))?;
        out.push(format!("{value:0hex_width$x}"));
    }
    Ok(out)
}

fn bit_len(value: u128) -> u32 {
    u128::BITS - value.leading_zeros()
}

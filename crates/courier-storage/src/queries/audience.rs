// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read access to tags and audience profiles, plus seeding helpers.

use std::collections::HashSet;

use courier_core::CourierError;
use rusqlite::{params, params_from_iter};

use crate::database::Database;
use crate::models::{AudienceProfile, ProfileColor, Tag};

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// The subset of `ids` naming active tags, ordered by ID.
pub async fn active_tags(db: &Database, ids: Vec<i64>) -> Result<Vec<Tag>, CourierError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, name, is_active FROM tags
                 WHERE is_active = 1 AND id IN ({}) ORDER BY id ASC",
                placeholders(ids.len())
            ))?;
            let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    is_active: row.get(2)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Profiles of `color` carrying any of `tag_ids`, newest ID first.
///
/// Profiles without a phone number and IDs in `exclude` are skipped; the
/// scan stops once `limit` profiles have been collected.
pub async fn select_profiles(
    db: &Database,
    tag_ids: &[i64],
    color: ProfileColor,
    exclude: &HashSet<i64>,
    limit: usize,
) -> Result<Vec<AudienceProfile>, CourierError> {
    if tag_ids.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }
    let tag_ids = tag_ids.to_vec();
    let exclude = exclude.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT p.id, p.uid, p.phone_number
                 FROM audience_profiles p
                 WHERE p.color = ? AND EXISTS (
                     SELECT 1 FROM audience_profile_tags pt
                     WHERE pt.profile_id = p.id AND pt.tag_id IN ({})
                 )
                 ORDER BY p.id DESC",
                placeholders(tag_ids.len())
            ))?;
            let color_param: rusqlite::types::Value = color.to_string().into();
            let args = std::iter::once(color_param)
                .chain(tag_ids.iter().map(|id| rusqlite::types::Value::Integer(*id)));
            let mut rows = stmt.query(params_from_iter(args))?;

            let mut out = Vec::with_capacity(limit.min(1024));
            while let Some(row) = rows.next()? {
                let id: i64 = row.get(0)?;
                let phone: Option<String> = row.get(2)?;
                let Some(phone) = phone.filter(|p| !p.trim().is_empty()) else {
                    continue;
                };
                if exclude.contains(&id) {
                    continue;
                }
                out.push(AudienceProfile {
                    id,
                    uid: row.get(1)?,
                    phone_number: Some(phone),
                    color,
                });
                if out.len() >= limit {
                    break;
                }
            }
            Ok(out)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert or update a tag.
pub async fn upsert_tag(
    db: &Database,
    id: i64,
    name: &str,
    is_active: bool,
) -> Result<(), CourierError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tags (id, name, is_active) VALUES (?1, ?2, ?3)
                 ON CONFLICT (id)
                 DO UPDATE SET name = excluded.name, is_active = excluded.is_active",
                params![id, name, is_active],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a profile with its tag memberships. Returns the profile ID.
pub async fn insert_profile(
    db: &Database,
    uid: &str,
    phone_number: Option<&str>,
    color: ProfileColor,
    tag_ids: &[i64],
) -> Result<i64, CourierError> {
    let uid = uid.to_string();
    let phone_number = phone_number.map(str::to_string);
    let tag_ids = tag_ids.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO audience_profiles (uid, phone_number, color) VALUES (?1, ?2, ?3)",
                params![uid, phone_number, color.to_string()],
            )?;
            let id = tx.last_insert_rowid();
            for tag_id in &tag_ids {
                tx.execute(
                    "INSERT OR IGNORE INTO audience_profile_tags (profile_id, tag_id)
                     VALUES (?1, ?2)",
                    params![id, tag_id],
                )?;
            }
            tx.commit()?;
            Ok(id)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

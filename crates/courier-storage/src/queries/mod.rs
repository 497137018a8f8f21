// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Each takes `&Database` and runs through `call()`;
//! `*_in` helpers take a plain connection so they compose inside a caller's
//! transaction.

pub mod audience;
pub mod campaigns;
pub mod selections;
pub mod sent;
pub mod sequence;
pub mod status_jobs;
pub mod status_results;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Serialize a value for a JSON TEXT column.
pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// Deserialize a JSON TEXT column at index `idx`.
pub(crate) fn from_json<T: DeserializeOwned>(idx: usize, text: String) -> rusqlite::Result<T> {
    serde_json::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

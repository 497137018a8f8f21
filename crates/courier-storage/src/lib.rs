// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Courier campaign scheduler.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single
//! `tokio-rusqlite` connection per process, and typed operations for
//! processed campaigns, sent messages, status jobs and results, audience
//! selections, and the tracking-ID sequence counter.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::{Database, format_timestamp, now_timestamp};
pub use models::*;

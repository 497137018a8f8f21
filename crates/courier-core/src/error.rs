// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier campaign scheduler.

use thiserror::Error;

/// The primary error type used across Courier collaborators and core operations.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Network-level failure talking to an external system.
    #[error("{service} transport error: {message}")]
    Transport {
        service: &'static str,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The external system answered, but with a non-success status or payload.
    #[error("{service} api error: {message}")]
    Api {
        service: &'static str,
        message: String,
    },

    /// Input rejected before any side effect (campaign readiness, malformed tags).
    #[error("validation error: {0}")]
    Validation(String),

    /// A processed-campaign row already exists for this campaign.
    #[error("campaign {campaign_id} already processed")]
    AlreadyProcessed { campaign_id: u64 },

    /// The audience history a plan was built on changed before it committed.
    #[error("audience history for customer {customer_id} changed during planning")]
    SelectionConflict { customer_id: u64 },

    /// Tracking-ID allocation invariant violated (counter overflow, corrupt value).
    #[error("allocation error: {0}")]
    Allocation(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CourierError::Storage {
            source: Box::new(err),
        }
    }
}

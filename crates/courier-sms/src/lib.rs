// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMS provider gateway for the Courier campaign scheduler.
//!
//! [`PayamClient`] implements [`courier_core::SmsGateway`] against the
//! PayamSMS web service: OAuth password-grant tokens, multi-recipient sends
//! with per-recipient bodies, and delivery-status reports keyed by the
//! tracking IDs the scheduler assigns.

pub mod client;
pub mod types;

pub use client::{PayamClient, send_date};

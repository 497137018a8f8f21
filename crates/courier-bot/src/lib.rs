// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Control-plane client for the Courier campaign scheduler.
//!
//! [`BotClient`] implements [`courier_core::ControlPlane`] over the
//! campaign-management bot API.

pub mod client;
pub mod types;

pub use client::BotClient;

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier integration tests.
//!
//! Provides mock collaborators and a database harness for fast,
//! deterministic tests without external services.
//!
//! # Components
//!
//! - [`MockControlPlane`] - in-memory control plane with call recording
//! - [`MockSmsGateway`] - SMS provider that acknowledges and reports every message
//! - [`MockNotifier`] - captures operator alerts
//! - [`TestHarness`] - temp-dir database plus audience seeding helpers

pub mod harness;
pub mod mock_control_plane;
pub mod mock_gateway;
pub mod mock_notifier;

pub use harness::{ADMIN_MOBILE, TestHarness, TestHarnessBuilder, ready_campaign};
pub use mock_control_plane::{ControlPlaneCall, MOCK_BOT_TOKEN, MockControlPlane};
pub use mock_gateway::{MOCK_SMS_TOKEN, MockSmsGateway};
pub use mock_notifier::MockNotifier;

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits for the external systems the scheduler talks to.
//!
//! Every trait uses `#[async_trait]` so implementations can be held as
//! `Arc<dyn Trait>` and swapped for mocks in tests.

pub mod control_plane;
pub mod gateway;
pub mod notifier;

pub use control_plane::ControlPlane;
pub use gateway::SmsGateway;
pub use notifier::Notifier;

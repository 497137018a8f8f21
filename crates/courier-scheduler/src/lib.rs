// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign delivery scheduler for Courier.
//!
//! The [`Reconciler`] polls the control plane for ready campaigns and hands
//! each new one to the [`CampaignProcessor`], which selects the audience,
//! allocates short links and tracking IDs, sends the batches and schedules
//! delayed status checks. The [`StatusWorker`] later runs those checks and
//! pushes aggregate statistics back to the control plane.

pub mod allocator;
pub mod audience;
pub mod notify;
pub mod processor;
pub mod reconciler;
pub mod status_worker;

pub use allocator::TrackingAllocator;
pub use audience::{AudiencePlan, AudienceSelector, tags_hash};
pub use notify::{AdminAlerter, SmsNotifier};
pub use processor::{CampaignProcessor, CampaignRunReport, DeliverySettings};
pub use reconciler::{Reconciler, TickReport};
pub use status_worker::{StatusPassReport, StatusWorker, align_reports};

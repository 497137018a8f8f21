// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier campaign scheduler.
//!
//! This crate provides the error type, the domain types shared by storage and
//! the scheduler, and the traits for the external systems (control plane, SMS
//! gateway, operator notifier) so they can be substituted in tests.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use types::{
    AudienceProfile, AudienceSelection, Campaign, CampaignStatistics, DeliveryReport,
    OutboundSms, ProcessedCampaign, ProfileColor, SendAck, SentSms, ShortLinkRecord, SmsStatus,
    StatusJob, StatusResult, Tag,
};

pub use traits::{ControlPlane, Notifier, SmsGateway};

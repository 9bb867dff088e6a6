//! Warden Core - Foundation types for the Warden tool-governance pipeline.
//!
//! This crate provides:
//! - Session and intent identifiers
//! - The `Intent` unit-of-work model and its lifecycle status
//! - Risk tiers shared by the classifier and the approval gate
//! - Policy denial codes surfaced to callers when a tool call is rejected

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod denial;
pub mod intent;
pub mod types;

pub use denial::{DenialCode, PolicyDenial};
pub use intent::{Intent, IntentStatus};
pub use types::{IntentId, RiskTier, SessionId};

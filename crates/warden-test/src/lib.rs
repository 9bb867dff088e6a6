//! Warden Test - Shared test utilities for the Warden crates.
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! warden-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! use warden_test::{ScriptedApprovalHandler, fixtures};
//!
//! let handler = ScriptedApprovalHandler::new().then_deny("not now");
//! let intents = fixtures::sample_intents();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;

pub use mocks::ScriptedApprovalHandler;

/// Install a test subscriber once, honoring `RUST_LOG`.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

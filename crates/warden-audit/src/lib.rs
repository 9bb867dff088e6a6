//! Warden Audit - content-addressed trace of agent mutations.
//!
//! This crate provides:
//! - SHA-256 content fingerprints
//! - Per-path optimistic write locks
//! - An append-only JSONL trace of completed mutations
//! - Argument sanitization for trace records
//!
//! # Example
//!
//! ```rust,no_run
//! use warden_audit::{ContentHash, PathLocks};
//! # async fn demo() -> warden_audit::AuditResult<()> {
//! let locks = PathLocks::new();
//! let expected = ContentHash::hash(b"fn main() {}\n");
//! let lease = locks.acquire("src/main.rs".as_ref(), Some(&expected)).await?;
//! // ... write the file ...
//! drop(lease);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod fingerprint;
mod lock;
mod reader;
mod record;
pub mod redact;
mod vcs;
mod writer;

pub use error::{AuditError, AuditResult};
pub use fingerprint::{ContentHash, fingerprint_file};
pub use lock::{PathLocks, WriteLease};
pub use reader::{TraceLog, read_trace};
pub use record::{Contributor, ContributorKind, RangeHash, TraceRecord};
pub use redact::Redactor;
pub use vcs::current_revision;
pub use writer::{TraceInput, TraceWriter};

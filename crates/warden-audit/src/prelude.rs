//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_audit::prelude::*;` to import all essential types.

pub use crate::{
    AuditError, AuditResult, ContentHash, PathLocks, TraceInput, TraceRecord, TraceWriter,
    WriteLease,
};

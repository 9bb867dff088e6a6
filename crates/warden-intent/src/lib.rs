//! Warden Intent - Intent catalog, scope matching and the session registry.
//!
//! - [`IntentCatalog`] loads declared intents from YAML
//! - [`ScopeMatcher`] decides whether a path falls inside an intent's owned scope
//! - [`SessionRegistry`] records which intent each session is working on
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use warden_core::{Intent, IntentId, SessionId};
//! use warden_intent::{IntentCatalog, SessionRegistry, is_in_scope};
//!
//! let catalog = Arc::new(IntentCatalog::from_intents([
//!     Intent::new("INT-001", "Auth").with_scope("src/auth/**"),
//! ]));
//! let registry = SessionRegistry::in_memory(catalog);
//! let session = SessionId::new("run-1");
//!
//! let intent = registry.declare_intent(&session, &IntentId::new("INT-001")).unwrap();
//! assert!(is_in_scope("src/auth/middleware.ts", &intent.owned_scope));
//! assert!(!is_in_scope("src/utils/helper.ts", &intent.owned_scope));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod catalog;
mod error;
pub mod registry;
pub mod scope;

pub use catalog::IntentCatalog;
pub use error::{IntentError, IntentResult};
pub use registry::{
    FileSessionStore, MemorySessionStore, SessionBinding, SessionRegistry, SessionStore,
};
pub use scope::{ScopeMatcher, is_in_scope, normalize_path, workspace_relative};

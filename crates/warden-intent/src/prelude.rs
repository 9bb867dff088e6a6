//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_intent::prelude::*;` to import all essential types.

pub use crate::{
    IntentCatalog, IntentError, IntentResult, ScopeMatcher, SessionBinding, SessionRegistry,
    SessionStore, is_in_scope,
};

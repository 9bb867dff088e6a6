//! Session/intent registry.
//!
//! Tracks which intent each session has declared. Declaration is validated
//! against the [`IntentCatalog`]; lookups re-check the catalog so an intent
//! that was completed or removed since declaration stops authorizing work.

mod store;

pub use store::{FileSessionStore, MemorySessionStore, SessionBinding, SessionStore};

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use warden_core::{Intent, IntentId, SessionId};

use crate::catalog::IntentCatalog;
use crate::error::{IntentError, IntentResult};

/// Maps sessions to their declared intent.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    catalog: Arc<IntentCatalog>,
}

impl SessionRegistry {
    /// Create a registry over an existing store.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, catalog: Arc<IntentCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Create a registry backed by process memory.
    #[must_use]
    pub fn in_memory(catalog: Arc<IntentCatalog>) -> Self {
        Self::new(Arc::new(MemorySessionStore::new()), catalog)
    }

    /// The catalog used for validation.
    #[must_use]
    pub fn catalog(&self) -> &Arc<IntentCatalog> {
        &self.catalog
    }

    /// Declare `intent_id` as the session's active intent, replacing any previous one.
    ///
    /// # Errors
    ///
    /// - [`IntentError::UnknownIntent`] if the catalog has no such intent
    /// - [`IntentError::NotAssignable`] if the intent is blocked or completed
    /// - a persistence error from the backing store
    pub fn declare_intent(
        &self,
        session_id: &SessionId,
        intent_id: &IntentId,
    ) -> IntentResult<Intent> {
        let intent = self
            .catalog
            .get(intent_id)
            .ok_or_else(|| IntentError::UnknownIntent {
                id: intent_id.clone(),
            })?;
        if !intent.is_assignable() {
            return Err(IntentError::NotAssignable {
                id: intent.id.clone(),
                status: intent.status,
            });
        }

        let now = Utc::now();
        self.store.upsert(session_id, &mut |current| {
            let mut next = current
                .cloned()
                .unwrap_or_else(|| SessionBinding::new(session_id.clone()));
            next.intent_id = Some(intent_id.clone());
            next.declared_at = Some(now);
            next
        })?;

        info!(session_id = %session_id, intent_id = %intent_id, "Intent declared");
        Ok(intent)
    }

    /// The session's declared intent id, if any.
    #[must_use]
    pub fn get_active_intent(&self, session_id: &SessionId) -> Option<IntentId> {
        self.store.get(session_id).and_then(|b| b.intent_id)
    }

    /// The session's declared intent, resolved against the catalog.
    ///
    /// Returns `None` when nothing is declared, or when the declared intent no
    /// longer exists or is no longer active/pending.
    #[must_use]
    pub fn active_intent(&self, session_id: &SessionId) -> Option<Intent> {
        let id = self.get_active_intent(session_id)?;
        match self.catalog.get(&id) {
            Some(intent) if intent.is_assignable() => Some(intent),
            Some(intent) => {
                debug!(
                    session_id = %session_id,
                    intent_id = %id,
                    status = %intent.status,
                    "Declared intent is no longer assignable"
                );
                None
            },
            None => {
                warn!(session_id = %session_id, intent_id = %id, "Declared intent vanished from catalog");
                None
            },
        }
    }

    /// Forget the session's declaration. Returns the intent that was declared.
    ///
    /// # Errors
    ///
    /// Returns a persistence error from the backing store.
    pub fn clear_intent(&self, session_id: &SessionId) -> IntentResult<Option<IntentId>> {
        let removed = self.store.remove(session_id)?;
        let previous = removed.and_then(|b| b.intent_id);
        if let Some(id) = &previous {
            info!(session_id = %session_id, intent_id = %id, "Intent cleared");
        }
        Ok(previous)
    }

    /// Drop everything recorded for a session.
    ///
    /// # Errors
    ///
    /// Returns a persistence error from the backing store.
    pub fn end_session(&self, session_id: &SessionId) -> IntentResult<()> {
        self.store.remove(session_id)?;
        debug!(session_id = %session_id, "Session ended");
        Ok(())
    }

    /// Attach a metadata entry to the session.
    ///
    /// # Errors
    ///
    /// Returns a persistence error from the backing store.
    pub fn set_metadata(
        &self,
        session_id: &SessionId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> IntentResult<()> {
        let (key, value) = (key.into(), value.into());
        self.store.upsert(session_id, &mut |current| {
            let mut next = current
                .cloned()
                .unwrap_or_else(|| SessionBinding::new(session_id.clone()));
            next.metadata.insert(key.clone(), value.clone());
            next
        })?;
        Ok(())
    }

    /// The full binding for a session.
    #[must_use]
    pub fn binding(&self, session_id: &SessionId) -> Option<SessionBinding> {
        self.store.get(session_id)
    }

    /// All known sessions.
    #[must_use]
    pub fn sessions(&self) -> Vec<SessionBinding> {
        self.store.list()
    }
}

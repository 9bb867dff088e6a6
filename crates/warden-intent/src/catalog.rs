//! Intent catalog.
//!
//! Loads the intent declaration file (YAML) and answers lookups by id. The
//! file is owned by humans and may be half-edited at any moment, so a missing
//! or malformed file yields an empty catalog with a warning instead of an
//! error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Deserialize;
use tracing::{debug, info, warn};
use warden_core::{Intent, IntentId};

use crate::error::{IntentError, IntentResult};

#[derive(Deserialize)]
#[serde(untagged)]
enum IntentDocument {
    Wrapped { active_intents: Vec<Intent> },
    Bare(Vec<Intent>),
}

/// Read-only view of declared intents.
#[derive(Debug, Default)]
pub struct IntentCatalog {
    source: Option<PathBuf>,
    intents: RwLock<BTreeMap<IntentId, Intent>>,
}

impl IntentCatalog {
    /// A catalog with no intents and no source.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A catalog holding the given intents and no source file.
    #[must_use]
    pub fn from_intents(intents: impl IntoIterator<Item = Intent>) -> Self {
        Self {
            source: None,
            intents: RwLock::new(index(intents.into_iter().collect())),
        }
    }

    /// Load from a YAML file.
    ///
    /// Never fails: unreadable or invalid input produces an empty catalog.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let source = path.into();
        let intents = read_source(&source);
        info!(path = %source.display(), count = intents.len(), "Loaded intent catalog");
        Self {
            source: Some(source),
            intents: RwLock::new(intents),
        }
    }

    /// Parse an intent document.
    ///
    /// Accepts either `active_intents: [...]` or a bare list.
    ///
    /// # Errors
    ///
    /// Returns [`IntentError::InvalidSource`] if the YAML does not match the schema.
    pub fn parse(yaml: &str) -> IntentResult<Vec<Intent>> {
        if yaml.trim().is_empty() {
            return Ok(Vec::new());
        }
        let doc: IntentDocument =
            serde_yaml::from_str(yaml).map_err(|e| IntentError::InvalidSource(e.to_string()))?;
        Ok(match doc {
            IntentDocument::Wrapped { active_intents } => active_intents,
            IntentDocument::Bare(intents) => intents,
        })
    }

    /// Re-read the source file, replacing the current contents.
    ///
    /// Returns the number of intents now loaded.
    pub fn reload(&self) -> usize {
        let Some(source) = &self.source else {
            return self.len();
        };
        let fresh = read_source(source);
        let count = fresh.len();
        *self.write() = fresh;
        debug!(path = %source.display(), count, "Reloaded intent catalog");
        count
    }

    /// Look up an intent by id.
    #[must_use]
    pub fn get(&self, id: &IntentId) -> Option<Intent> {
        self.read().get(id).cloned()
    }

    /// All intents, ordered by id.
    #[must_use]
    pub fn list(&self) -> Vec<Intent> {
        self.read().values().cloned().collect()
    }

    /// Number of intents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// The file this catalog was loaded from.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<IntentId, Intent>> {
        self.intents.read().unwrap_or_else(|e| {
            warn!("Intent catalog lock was poisoned, recovering");
            e.into_inner()
        })
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<IntentId, Intent>> {
        self.intents.write().unwrap_or_else(|e| {
            warn!("Intent catalog lock was poisoned, recovering");
            e.into_inner()
        })
    }
}

fn read_source(path: &Path) -> BTreeMap<IntentId, Intent> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Intent file not found; no intents declared");
            return BTreeMap::new();
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Intent file unreadable; no intents declared");
            return BTreeMap::new();
        },
    };
    match IntentCatalog::parse(&content) {
        Ok(intents) => index(intents),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Intent file malformed; no intents declared");
            BTreeMap::new()
        },
    }
}

fn index(intents: Vec<Intent>) -> BTreeMap<IntentId, Intent> {
    let mut map = BTreeMap::new();
    for intent in intents {
        if map.contains_key(&intent.id) {
            warn!(intent_id = %intent.id, "Duplicate intent id; keeping the first declaration");
            continue;
        }
        map.insert(intent.id.clone(), intent);
    }
    map
}

//! Workspace bootstrap: configuration plus the services built from it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::debug;
use warden_approval::RiskClassifier;
use warden_audit::{PathLocks, TraceWriter};
use warden_config::Config;
use warden_hooks::{GovernanceServices, HookPipeline};
use warden_intent::{FileSessionStore, IntentCatalog, MemorySessionStore, SessionRegistry, SessionStore};

use crate::config_bridge;

/// A workspace with its configuration loaded.
#[derive(Debug)]
pub(crate) struct Workspace {
    pub(crate) root: PathBuf,
    pub(crate) config: Config,
    pub(crate) catalog: Arc<IntentCatalog>,
    pub(crate) registry: SessionRegistry,
}

impl Workspace {
    /// Open a workspace around an already-loaded configuration.
    pub(crate) fn open(root: &Path, config: Config) -> Self {
        let catalog = Arc::new(IntentCatalog::load(Config::resolve(
            root,
            &config.intents.path,
        )));
        let store: Arc<dyn SessionStore> = match config.registry.backend.as_str() {
            "memory" => Arc::new(MemorySessionStore::new()),
            _ => Arc::new(FileSessionStore::open(Config::resolve(
                root,
                &config.registry.path,
            ))),
        };
        debug!(
            root = %root.display(),
            intents = catalog.len(),
            backend = %config.registry.backend,
            "Workspace opened"
        );
        Self {
            root: root.to_path_buf(),
            registry: SessionRegistry::new(store, Arc::clone(&catalog)),
            catalog,
            config,
        }
    }

    /// Where the audit trace lives.
    pub(crate) fn trace_path(&self) -> PathBuf {
        Config::resolve(&self.root, &self.config.trace.path)
    }

    /// Tool classification from `[tools]`.
    pub(crate) fn classifier(&self) -> anyhow::Result<Arc<RiskClassifier>> {
        let tools = config_bridge::to_tool_catalog(&self.config.tools)?;
        Ok(Arc::new(RiskClassifier::new(tools)))
    }

    /// The canonical pipeline for this workspace.
    pub(crate) fn pipeline(&self) -> anyhow::Result<HookPipeline> {
        let trace_path = self.trace_path();
        let trace = TraceWriter::open(&trace_path)
            .with_context(|| format!("cannot open trace file {}", trace_path.display()))?
            .with_contributor(config_bridge::to_contributor(&self.config.trace))
            .with_redactor(config_bridge::to_redactor(&self.config.trace));

        Ok(HookPipeline::governed(GovernanceServices {
            registry: self.registry.clone(),
            classifier: self.classifier()?,
            gate: config_bridge::to_approval_gate(&self.config.approval),
            locks: PathLocks::new(),
            trace: Arc::new(trace),
        }))
    }
}

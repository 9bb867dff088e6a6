//! The hook pipeline.
//!
//! A pipeline is an explicit, ordered list of validators (pre-stage) and
//! observers (post-stage). Validators run one after another on the caller's
//! task and the first denial ends the chain. Observers run on a tracked
//! background task so the caller never waits for them.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info, info_span};
use warden_approval::{ApprovalGate, RiskClassifier};
use warden_audit::{PathLocks, TraceWriter, WriteLease};
use warden_core::{Intent, PolicyDenial};
use warden_intent::SessionRegistry;

use crate::context::{PostToolEvent, ToolInvocation};
use crate::executor::{ToolExecutor, ToolOutcome};
use crate::fault::{FAULT_CHANNEL_CAPACITY, HookStage, PipelineFault, panic_message, report};
use crate::observer::{Observer, TraceObserver};
use crate::result::HookResult;
use crate::validator::{PreStage, Validator};
use crate::validators::{
    IntentConsistencyValidator, IntentDeclaredValidator, IntentSelectionValidator,
    OptimisticLockValidator, RiskGateValidator, ScopeValidator,
};

/// Shared services behind the canonical pipeline.
#[derive(Debug, Clone)]
pub struct GovernanceServices {
    /// Session to intent bindings.
    pub registry: SessionRegistry,
    /// Tool and command classification.
    pub classifier: Arc<RiskClassifier>,
    /// Human approval.
    pub gate: ApprovalGate,
    /// Per-path write leases.
    pub locks: PathLocks,
    /// Audit trace.
    pub trace: Arc<TraceWriter>,
}

/// Result of the pre-stage.
///
/// Holds the write leases taken for the call; hand it to
/// [`HookPipeline::complete`] once the tool has run so they are released
/// after the trace record is written.
#[derive(Debug)]
pub struct PreToolOutcome {
    /// The stage verdict.
    pub result: HookResult,
    /// The call with every argument overlay applied.
    pub invocation: ToolInvocation,
    /// Intent the call was authorized under.
    pub authorized_intent: Option<Intent>,
    leases: Vec<WriteLease>,
}

impl PreToolOutcome {
    /// Whether the call may run.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.result.proceeds()
    }

    /// The denial, if the call may not run.
    #[must_use]
    pub fn denial(&self) -> Option<PolicyDenial> {
        self.result.denial()
    }

    /// Number of write leases held for the call.
    #[must_use]
    pub fn lease_count(&self) -> usize {
        self.leases.len()
    }
}

/// Ordered pre- and post-execution hooks around tool calls.
#[derive(Clone)]
pub struct HookPipeline {
    classifier: Arc<RiskClassifier>,
    validators: Arc<[Arc<dyn Validator>]>,
    observers: Arc<[Arc<dyn Observer>]>,
    tracker: TaskTracker,
    faults: broadcast::Sender<PipelineFault>,
}

impl fmt::Debug for HookPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookPipeline")
            .field("validators", &self.validator_names())
            .field(
                "observers",
                &self.observers.iter().map(|o| o.name()).collect::<Vec<_>>(),
            )
            .field("pending_tasks", &self.tracker.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`HookPipeline`].
pub struct HookPipelineBuilder {
    classifier: Arc<RiskClassifier>,
    validators: Vec<Arc<dyn Validator>>,
    observers: Vec<Arc<dyn Observer>>,
}

impl HookPipelineBuilder {
    /// Append a validator.
    #[must_use]
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Append an observer.
    #[must_use]
    pub fn observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    /// Finish the pipeline.
    #[must_use]
    pub fn build(self) -> HookPipeline {
        let (faults, _) = broadcast::channel(FAULT_CHANNEL_CAPACITY);
        HookPipeline {
            classifier: self.classifier,
            validators: self.validators.into(),
            observers: self.observers.into(),
            tracker: TaskTracker::new(),
            faults,
        }
    }
}

impl HookPipeline {
    /// Start an empty pipeline. `classifier` decides which calls need an intent.
    #[must_use]
    pub fn builder(classifier: Arc<RiskClassifier>) -> HookPipelineBuilder {
        HookPipelineBuilder {
            classifier,
            validators: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// The canonical pipeline: intent selection, intent declared, intent
    /// consistency, scope, risk gate and optimistic lock, then the audit trace.
    #[must_use]
    pub fn governed(services: GovernanceServices) -> Self {
        let GovernanceServices {
            registry,
            classifier,
            gate,
            locks,
            trace,
        } = services;
        Self::builder(Arc::clone(&classifier))
            .validator(IntentSelectionValidator::new(registry.clone()))
            .validator(IntentDeclaredValidator::new(registry))
            .validator(IntentConsistencyValidator)
            .validator(ScopeValidator)
            .validator(RiskGateValidator::new(Arc::clone(&classifier), gate))
            .validator(OptimisticLockValidator::new(locks))
            .observer(TraceObserver::new(trace, classifier))
            .build()
    }

    /// Validator names in run order.
    #[must_use]
    pub fn validator_names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    /// Receive every fault raised from now on.
    #[must_use]
    pub fn subscribe_faults(&self) -> broadcast::Receiver<PipelineFault> {
        self.faults.subscribe()
    }

    /// Run the pre-stage for a call.
    pub async fn pre_tool_use(&self, invocation: ToolInvocation) -> PreToolOutcome {
        let span = info_span!(
            "tool_invocation",
            invocation_id = %invocation.invocation_id,
            session_id = %invocation.session_id,
            tool = %invocation.tool_name,
        );
        self.run_pre_stage(invocation).instrument(span).await
    }

    async fn run_pre_stage(&self, invocation: ToolInvocation) -> PreToolOutcome {
        let tool_class = self
            .classifier
            .classify_tool(&invocation.tool_name, &invocation.args);
        let invocation_id = invocation.invocation_id;
        let mut stage = PreStage::new(invocation, tool_class);

        for validator in self.validators.iter() {
            let name = validator.name();
            let verdict = AssertUnwindSafe(validator.validate(&mut stage))
                .catch_unwind()
                .await;
            let result = match verdict {
                Ok(Ok(result)) => result,
                Ok(Err(fault)) => {
                    report(&self.faults, HookStage::Pre, name, invocation_id, fault.to_string());
                    continue;
                },
                Err(panic) => {
                    report(
                        &self.faults,
                        HookStage::Pre,
                        name,
                        invocation_id,
                        panic_message(panic.as_ref()),
                    );
                    continue;
                },
            };

            if result.is_blocking() {
                info!(
                    validator = name,
                    code = ?result.code(),
                    reason = result.reason().unwrap_or_default(),
                    "Tool call denied"
                );
                return PreToolOutcome {
                    result,
                    invocation: stage.invocation,
                    authorized_intent: stage.authorized_intent,
                    leases: Vec::new(),
                };
            }
            stage.absorb(&result);
        }

        let mut result = HookResult::continue_();
        if stage.args_modified {
            result = result.with_modified_args(stage.invocation.args.clone());
        }
        if !stage.context.is_empty() {
            result = result.with_context(stage.context.join("\n\n"));
        }
        debug!(
            class = ?stage.tool_class,
            intent_id = ?stage.authorized_intent.as_ref().map(|i| i.id.as_str()),
            leases = stage.leases.len(),
            "Tool call allowed"
        );
        PreToolOutcome {
            result,
            invocation: stage.invocation,
            authorized_intent: stage.authorized_intent,
            leases: stage.leases,
        }
    }

    /// Run the post-stage for a call whose pre-stage ran elsewhere.
    ///
    /// Returns immediately; observers run in the background. Must be called
    /// from within a Tokio runtime.
    pub fn post_tool_use(&self, event: PostToolEvent) -> HookResult {
        self.spawn_observers(event, Vec::new());
        HookResult::continue_()
    }

    /// Run the post-stage for a call that passed [`Self::pre_tool_use`].
    ///
    /// The call's write leases are released once every observer is done.
    /// Must be called from within a Tokio runtime.
    pub fn complete(
        &self,
        outcome: PreToolOutcome,
        success: bool,
        output: Option<Value>,
        duration: Duration,
    ) -> HookResult {
        if !outcome.is_allowed() {
            debug!(invocation_id = %outcome.invocation.invocation_id, "Denied call has no post-stage");
            return HookResult::continue_();
        }
        let PreToolOutcome {
            invocation,
            authorized_intent,
            leases,
            ..
        } = outcome;
        let mut event = PostToolEvent::new(invocation, success, duration).with_intent(authorized_intent);
        event.output = output;
        self.spawn_observers(event, leases);
        HookResult::continue_()
    }

    /// Drive a whole call: pre-stage, execution, post-stage.
    ///
    /// # Errors
    ///
    /// Returns the [`PolicyDenial`] if the pre-stage rejects the call; the
    /// executor is not run in that case.
    pub async fn invoke<E>(
        &self,
        invocation: ToolInvocation,
        executor: &E,
    ) -> Result<ToolOutcome, PolicyDenial>
    where
        E: ToolExecutor + ?Sized,
    {
        let outcome = self.pre_tool_use(invocation).await;
        if let Some(denial) = outcome.denial() {
            return Err(denial);
        }

        let started = Instant::now();
        let output = executor.execute(&outcome.invocation).await;
        let duration = started.elapsed();

        let context = outcome.result.context().map(str::to_owned);
        self.complete(outcome, output.success, Some(output.output.clone()), duration);
        Ok(ToolOutcome {
            output,
            duration,
            context,
        })
    }

    /// Wait for every background observer task started so far.
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    fn spawn_observers(&self, event: PostToolEvent, leases: Vec<WriteLease>) {
        let observers = Arc::clone(&self.observers);
        let faults = self.faults.clone();
        let span = info_span!(
            "tool_invocation",
            invocation_id = %event.invocation.invocation_id,
            session_id = %event.invocation.session_id,
            tool = %event.invocation.tool_name,
        );

        self.tracker.spawn(
            async move {
                let invocation_id = event.invocation.invocation_id;
                for observer in observers.iter() {
                    let name = observer.name();
                    match AssertUnwindSafe(observer.observe(&event)).catch_unwind().await {
                        Ok(Ok(())) => {},
                        Ok(Err(fault)) => {
                            report(&faults, HookStage::Post, name, invocation_id, fault.to_string());
                        },
                        Err(panic) => {
                            report(
                                &faults,
                                HookStage::Post,
                                name,
                                invocation_id,
                                panic_message(panic.as_ref()),
                            );
                        },
                    }
                }
                drop(leases);
            }
            .instrument(span),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use warden_core::{DenialCode, SessionId};
    use warden_test::fixtures;

    use crate::validator::HookFault;

    struct Deny;

    #[async_trait]
    impl Validator for Deny {
        fn name(&self) -> &'static str {
            "deny"
        }

        async fn validate(&self, _stage: &mut PreStage) -> Result<HookResult, HookFault> {
            Ok(HookResult::block(DenialCode::ScopeViolation, "nope"))
        }
    }

    struct Fails;

    #[async_trait]
    impl Validator for Fails {
        fn name(&self) -> &'static str {
            "fails"
        }

        async fn validate(&self, _stage: &mut PreStage) -> Result<HookResult, HookFault> {
            Err(HookFault::Internal("backend down".into()))
        }
    }

    struct Panics;

    #[async_trait]
    impl Validator for Panics {
        fn name(&self) -> &'static str {
            "panics"
        }

        async fn validate(&self, _stage: &mut PreStage) -> Result<HookResult, HookFault> {
            panic!("validator bug")
        }
    }

    struct Annotate(&'static str);

    #[async_trait]
    impl Validator for Annotate {
        fn name(&self) -> &'static str {
            "annotate"
        }

        async fn validate(&self, stage: &mut PreStage) -> Result<HookResult, HookFault> {
            let mut overlay = serde_json::Map::new();
            overlay.insert("seen".into(), serde_json::json!(stage.context.len()));
            Ok(HookResult::continue_()
                .with_context(self.0)
                .with_modified_args(overlay))
        }
    }

    struct Counter(Arc<std::sync::atomic::AtomicUsize>);

    #[async_trait]
    impl Observer for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        async fn observe(&self, _event: &PostToolEvent) -> Result<(), HookFault> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingObserver;

    #[async_trait]
    impl Observer for FailingObserver {
        fn name(&self) -> &'static str {
            "failing_observer"
        }

        async fn observe(&self, _event: &PostToolEvent) -> Result<(), HookFault> {
            Err(HookFault::Internal("disk full".into()))
        }
    }

    fn invocation() -> ToolInvocation {
        ToolInvocation::new(
            SessionId::new("s1"),
            "write_to_file",
            fixtures::write_args("src/auth/a.ts", "x"),
            "/w",
        )
    }

    fn builder() -> HookPipelineBuilder {
        HookPipeline::builder(Arc::new(RiskClassifier::default()))
    }

    #[tokio::test]
    async fn test_empty_pipeline_allows() {
        let outcome = builder().build().pre_tool_use(invocation()).await;
        assert!(outcome.is_allowed());
        assert!(outcome.result.context().is_none());
        assert!(outcome.result.modified_args().is_none());
    }

    #[tokio::test]
    async fn test_first_denial_short_circuits() {
        let pipeline = builder().validator(Deny).validator(Panics).build();
        let mut faults = pipeline.subscribe_faults();
        let outcome = pipeline.pre_tool_use(invocation()).await;
        assert_eq!(outcome.denial().unwrap().code, DenialCode::ScopeViolation);
        assert!(faults.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_faults_fail_open_and_are_published() {
        let pipeline = builder().validator(Fails).validator(Panics).build();
        let mut faults = pipeline.subscribe_faults();
        let outcome = pipeline.pre_tool_use(invocation()).await;
        assert!(outcome.is_allowed());

        let first = faults.try_recv().unwrap();
        assert_eq!(first.hook, "fails");
        assert_eq!(first.stage, HookStage::Pre);
        assert_eq!(first.invocation_id, outcome.invocation.invocation_id);
        let second = faults.try_recv().unwrap();
        assert_eq!(second.hook, "panics");
        assert!(second.message.contains("validator bug"));
    }

    #[tokio::test]
    async fn test_fault_never_masks_later_denial() {
        let pipeline = builder().validator(Fails).validator(Deny).build();
        let outcome = pipeline.pre_tool_use(invocation()).await;
        assert!(!outcome.is_allowed());
    }

    #[tokio::test]
    async fn test_overlays_and_context_accumulate() {
        let pipeline = builder()
            .validator(Annotate("first"))
            .validator(Annotate("second"))
            .build();
        let outcome = pipeline.pre_tool_use(invocation()).await;
        assert_eq!(outcome.result.context(), Some("first\n\nsecond"));
        assert_eq!(outcome.result.modified_args().unwrap()["seen"], 1);
        assert_eq!(outcome.invocation.args["path"], "src/auth/a.ts");
    }

    #[tokio::test]
    async fn test_post_stage_runs_in_background_until_flushed() {
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let pipeline = builder().observer(Counter(count.clone())).build();
        let result = pipeline.post_tool_use(PostToolEvent::new(
            invocation(),
            true,
            Duration::from_millis(1),
        ));
        assert!(result.proceeds());
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 0);

        pipeline.flush().await;
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);

        pipeline.post_tool_use(PostToolEvent::new(invocation(), false, Duration::ZERO));
        pipeline.flush().await;
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_observer_fault_is_published_not_surfaced() {
        let pipeline = builder().observer(FailingObserver).build();
        let mut faults = pipeline.subscribe_faults();
        let result = pipeline.post_tool_use(PostToolEvent::new(invocation(), true, Duration::ZERO));
        assert!(result.proceeds());
        pipeline.flush().await;
        let fault = faults.try_recv().unwrap();
        assert_eq!(fault.stage, HookStage::Post);
        assert_eq!(fault.message, "disk full");
    }

    #[test]
    fn test_governed_order() {
        let dir = tempfile::tempdir().unwrap();
        let services = GovernanceServices {
            registry: SessionRegistry::in_memory(Arc::new(warden_intent::IntentCatalog::empty())),
            classifier: Arc::new(RiskClassifier::default()),
            gate: ApprovalGate::without_handler(),
            locks: PathLocks::new(),
            trace: Arc::new(TraceWriter::open(dir.path().join("t.jsonl")).unwrap()),
        };
        assert_eq!(
            HookPipeline::governed(services).validator_names(),
            vec![
                "intent_selection",
                "intent_declared",
                "intent_consistency",
                "scope",
                "risk_gate",
                "optimistic_lock",
            ]
        );
    }
}

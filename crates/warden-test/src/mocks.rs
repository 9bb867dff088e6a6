//! Mock implementations for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use warden_approval::{ApprovalDecision, ApprovalHandler, ApprovalRequest};

/// Approval handler that replays queued decisions and records every request.
///
/// Uses `std::sync::Mutex` so builder methods work outside a runtime.
#[derive(Debug, Clone)]
pub struct ScriptedApprovalHandler {
    decisions: Arc<Mutex<VecDeque<Option<ApprovalDecision>>>>,
    requests: Arc<Mutex<Vec<ApprovalRequest>>>,
    default_decision: Option<ApprovalDecision>,
    delay: Option<Duration>,
}

impl Default for ScriptedApprovalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedApprovalHandler {
    /// A handler that answers nothing until scripted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            decisions: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            default_decision: None,
            delay: None,
        }
    }

    /// Queue an approval.
    #[must_use]
    pub fn then_approve(self) -> Self {
        self.push(Some(ApprovalDecision::Approve))
    }

    /// Queue a denial.
    #[must_use]
    pub fn then_deny(self, reason: &str) -> Self {
        self.push(Some(ApprovalDecision::Deny {
            reason: Some(reason.to_owned()),
        }))
    }

    /// Queue a non-answer.
    #[must_use]
    pub fn then_ignore(self) -> Self {
        self.push(None)
    }

    /// Answer with `decision` once the queue is empty.
    #[must_use]
    pub fn otherwise(mut self, decision: ApprovalDecision) -> Self {
        self.default_decision = Some(decision);
        self
    }

    /// Wait this long before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ApprovalRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn push(self, decision: Option<ApprovalDecision>) -> Self {
        if let Ok(mut queue) = self.decisions.lock() {
            queue.push_back(decision);
        }
        self
    }
}

#[async_trait]
impl ApprovalHandler for ScriptedApprovalHandler {
    async fn request_approval(&self, request: ApprovalRequest) -> Option<ApprovalDecision> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self.decisions.lock().ok().and_then(|mut q| q.pop_front());
        match queued {
            Some(decision) => decision,
            None => self.default_decision.clone(),
        }
    }
}

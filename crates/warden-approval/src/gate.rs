//! Human-in-the-loop approval gate.
//!
//! The gate suspends a risky call until an external [`ApprovalHandler`]
//! decides, or until the timeout expires. It never errors: every outcome
//! other than an explicit approval is a denial.
//!
//! # Example
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use warden_approval::{ApprovalDecision, ApprovalHandler, ApprovalRequest};
//!
//! struct SlackHandler { /* ... */ }
//!
//! #[async_trait]
//! impl ApprovalHandler for SlackHandler {
//!     async fn request_approval(&self, request: ApprovalRequest) -> Option<ApprovalDecision> {
//!         // Post the request and wait for a reaction.
//!         todo!()
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use warden_core::{DenialCode, IntentId, PolicyDenial, SessionId};

use crate::classifier::CommandClassification;

/// Default approval timeout (5 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// A pending decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique request id.
    pub id: Uuid,
    /// Session asking.
    pub session_id: SessionId,
    /// Tool being called.
    pub tool_name: String,
    /// Intent the call is attributed to.
    pub intent_id: Option<IntentId>,
    /// Why approval is needed.
    pub classification: CommandClassification,
    /// When the request was raised.
    pub requested_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// Create a request.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        tool_name: impl Into<String>,
        classification: CommandClassification,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            tool_name: tool_name.into(),
            intent_id: None,
            classification,
            requested_at: Utc::now(),
        }
    }

    /// Attribute the request to an intent.
    #[must_use]
    pub fn with_intent(mut self, intent_id: Option<IntentId>) -> Self {
        self.intent_id = intent_id;
        self
    }
}

/// A handler's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// Let the call proceed.
    Approve,
    /// Reject the call.
    Deny {
        /// Reviewer's explanation.
        reason: Option<String>,
    },
}

/// Source of human decisions.
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    /// Ask for a decision.
    ///
    /// Returns `None` if no decision was made (dismissed, unavailable, etc.).
    async fn request_approval(&self, request: ApprovalRequest) -> Option<ApprovalDecision>;

    /// Whether the handler can currently reach a human.
    fn is_available(&self) -> bool {
        true
    }
}

/// What the gate concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// A human approved.
    Approved,
    /// Denied, or no decision could be obtained.
    Rejected {
        /// Explanation.
        reason: String,
    },
    /// No decision within the timeout.
    TimedOut {
        /// How long the gate waited.
        after: Duration,
    },
}

impl GateOutcome {
    /// Whether the call may proceed.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }

    /// The denial to surface, if the call may not proceed.
    #[must_use]
    pub fn denial(&self, tool_name: &str) -> Option<PolicyDenial> {
        match self {
            Self::Approved => None,
            Self::Rejected { reason } => Some(PolicyDenial::new(
                DenialCode::HitlRejected,
                format!("{tool_name} was not approved: {reason}"),
            )),
            Self::TimedOut { after } => Some(PolicyDenial::new(
                DenialCode::HitlTimeout,
                format!(
                    "{tool_name} was not approved within {}s",
                    after.as_secs()
                ),
            )),
        }
    }
}

/// Suspends calls pending a human decision.
#[derive(Clone)]
pub struct ApprovalGate {
    handler: Option<Arc<dyn ApprovalHandler>>,
    timeout: Duration,
}

impl ApprovalGate {
    /// Create a gate around a handler.
    #[must_use]
    pub fn new(handler: Arc<dyn ApprovalHandler>) -> Self {
        Self {
            handler: Some(handler),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// A gate with no handler: every request is rejected.
    #[must_use]
    pub fn without_handler() -> Self {
        Self {
            handler: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set how long to wait for a decision.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The decision timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ask for a decision.
    ///
    /// The handler runs in its own task so that a panic is contained and a
    /// timeout can abort it.
    pub async fn request_approval(&self, request: ApprovalRequest) -> GateOutcome {
        let Some(handler) = &self.handler else {
            warn!(tool = %request.tool_name, "No approval handler registered; rejecting");
            return GateOutcome::Rejected {
                reason: "no approval handler is registered".to_owned(),
            };
        };
        if !handler.is_available() {
            warn!(tool = %request.tool_name, "Approval handler unavailable; rejecting");
            return GateOutcome::Rejected {
                reason: "approval handler is unavailable".to_owned(),
            };
        }

        let request_id = request.id;
        let tool = request.tool_name.clone();
        info!(
            request_id = %request_id,
            tool = %tool,
            tier = %request.classification.tier,
            reason = %request.classification.reason,
            "Awaiting human approval"
        );

        let handler = Arc::clone(handler);
        let mut task = tokio::spawn(async move { handler.request_approval(request).await });

        match tokio::time::timeout(self.timeout, &mut task).await {
            Err(_) => {
                task.abort();
                warn!(
                    request_id = %request_id,
                    tool = %tool,
                    timeout_secs = self.timeout.as_secs(),
                    "Approval timed out"
                );
                GateOutcome::TimedOut {
                    after: self.timeout,
                }
            },
            Ok(Err(e)) => {
                error!(request_id = %request_id, tool = %tool, error = %e, "Approval handler failed");
                GateOutcome::Rejected {
                    reason: "approval handler failed".to_owned(),
                }
            },
            Ok(Ok(None)) => {
                debug!(request_id = %request_id, tool = %tool, "No decision returned");
                GateOutcome::Rejected {
                    reason: "no decision was made".to_owned(),
                }
            },
            Ok(Ok(Some(ApprovalDecision::Approve))) => {
                info!(request_id = %request_id, tool = %tool, "Approved");
                GateOutcome::Approved
            },
            Ok(Ok(Some(ApprovalDecision::Deny { reason }))) => {
                info!(request_id = %request_id, tool = %tool, "Denied");
                GateOutcome::Rejected {
                    reason: reason.unwrap_or_else(|| "denied by reviewer".to_owned()),
                }
            },
        }
    }

    /// Ask for a decision and collapse it to yes/no.
    pub async fn approve(&self, request: ApprovalRequest) -> bool {
        self.request_approval(request).await.is_approved()
    }
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::without_handler()
    }
}

impl fmt::Debug for ApprovalGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApprovalGate")
            .field("has_handler", &self.handler.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A handler that answers every request the same way.
#[derive(Debug, Clone)]
pub struct StaticApprovalHandler {
    decision: ApprovalDecision,
}

impl StaticApprovalHandler {
    /// Approve everything.
    #[must_use]
    pub fn approve_all() -> Self {
        Self {
            decision: ApprovalDecision::Approve,
        }
    }

    /// Deny everything with `reason`.
    #[must_use]
    pub fn deny_all(reason: impl Into<String>) -> Self {
        Self {
            decision: ApprovalDecision::Deny {
                reason: Some(reason.into()),
            },
        }
    }
}

#[async_trait]
impl ApprovalHandler for StaticApprovalHandler {
    async fn request_approval(&self, _request: ApprovalRequest) -> Option<ApprovalDecision> {
        Some(self.decision.clone())
    }
}

/// A request waiting for an answer from whoever drains the channel.
#[derive(Debug)]
pub struct PendingApproval {
    /// The request.
    pub request: ApprovalRequest,
    responder: oneshot::Sender<ApprovalDecision>,
}

impl PendingApproval {
    /// Answer the request. Returns `false` if the gate stopped waiting.
    pub fn respond(self, decision: ApprovalDecision) -> bool {
        self.responder.send(decision).is_ok()
    }

    /// Approve the request.
    pub fn approve(self) -> bool {
        self.respond(ApprovalDecision::Approve)
    }

    /// Deny the request.
    pub fn deny(self, reason: impl Into<String>) -> bool {
        self.respond(ApprovalDecision::Deny {
            reason: Some(reason.into()),
        })
    }
}

/// Forwards requests over a channel so a host UI can answer them.
#[derive(Debug, Clone)]
pub struct ChannelApprovalHandler {
    tx: mpsc::Sender<PendingApproval>,
}

impl ChannelApprovalHandler {
    /// Create a handler and the receiver the host drains.
    #[must_use]
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<PendingApproval>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ApprovalHandler for ChannelApprovalHandler {
    async fn request_approval(&self, request: ApprovalRequest) -> Option<ApprovalDecision> {
        let (responder, answer) = oneshot::channel();
        self.tx
            .send(PendingApproval { request, responder })
            .await
            .ok()?;
        answer.await.ok()
    }

    fn is_available(&self) -> bool {
        !self.tx.is_closed()
    }
}

//! Terminal approval handler.
//!
//! Prompts on the controlling terminal with `dialoguer`. The hook boundary
//! reads its request from stdin, so the prompt is drawn on stderr.

use std::io::IsTerminal;

use async_trait::async_trait;
use dialoguer::{Select, theme::ColorfulTheme};
use warden_approval::{ApprovalDecision, ApprovalHandler, ApprovalRequest};

use crate::theme::Theme;

/// Asks the person at the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TerminalApprovalHandler;

impl TerminalApprovalHandler {
    /// Create a new terminal approval handler.
    pub(crate) fn new() -> Self {
        Self
    }
}

fn render(request: &ApprovalRequest) -> String {
    let classification = &request.classification;
    let mut lines = vec![
        String::new(),
        Theme::header("Approval required"),
        Theme::separator(),
        Theme::kv("Tool", &request.tool_name),
        Theme::kv("Risk", &Theme::risk_tier(classification.tier)),
        Theme::kv("Reason", &classification.reason),
        Theme::kv("Command", &classification.command),
        Theme::kv("Session", &Theme::session_id(request.session_id.as_str())),
    ];
    if let Some(intent) = &request.intent_id {
        lines.push(Theme::kv("Intent", intent.as_str()));
    }
    if let Some(mitigation) = &classification.mitigation {
        lines.push(Theme::kv("Suggestion", mitigation));
    }
    lines.push(Theme::separator());
    lines.join("\n")
}

#[async_trait]
impl ApprovalHandler for TerminalApprovalHandler {
    async fn request_approval(&self, request: ApprovalRequest) -> Option<ApprovalDecision> {
        let prompt = render(&request);
        let choice = tokio::task::spawn_blocking(move || {
            eprintln!("{prompt}");
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Allow this call?")
                .items(&["Deny", "Approve"])
                .default(0)
                .interact_opt()
                .ok()
                .flatten()
        })
        .await
        .ok()
        .flatten()?;

        match choice {
            1 => Some(ApprovalDecision::Approve),
            0 => Some(ApprovalDecision::Deny {
                reason: Some("denied at the terminal".to_owned()),
            }),
            _ => None,
        }
    }

    fn is_available(&self) -> bool {
        std::io::stderr().is_terminal()
    }
}

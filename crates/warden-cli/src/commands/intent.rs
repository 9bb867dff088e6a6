//! Intent commands - inspect the catalog and session declarations.

use colored::Colorize;
use serde_json::json;
use warden_core::{IntentId, SessionId};

use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;
use crate::workspace::Workspace;

/// `warden intent list`
pub(crate) fn list_intents(workspace: &Workspace, format: OutputFormat) -> anyhow::Result<()> {
    let intents = workspace.catalog.list();
    if format == OutputFormat::Json {
        return print_json(&intents);
    }
    if intents.is_empty() {
        let source = workspace
            .catalog
            .source()
            .map_or_else(|| "<none>".to_owned(), |p| p.display().to_string());
        println!("{}", Theme::info(&format!("No intents declared in {source}")));
        return Ok(());
    }

    println!("\n{}", Theme::header("Intents"));
    println!(
        "{:<12} {:<10} {:<30} {}",
        "ID".dimmed(),
        "STATUS".dimmed(),
        "NAME".dimmed(),
        "SCOPE".dimmed()
    );
    println!("{}", Theme::separator());
    for intent in intents {
        let status = if intent.is_assignable() {
            intent.status.to_string().green().to_string()
        } else {
            intent.status.to_string().dimmed().to_string()
        };
        println!(
            "{:<12} {:<10} {:<30} {}",
            intent.id.as_str().cyan(),
            status,
            intent.name,
            intent.owned_scope.join(", ")
        );
    }
    println!();
    Ok(())
}

/// `warden intent declare <session> <intent>`
pub(crate) fn declare_intent(
    workspace: &Workspace,
    session: &str,
    intent: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let intent = workspace
        .registry
        .declare_intent(&SessionId::new(session), &IntentId::new(intent))?;
    if format == OutputFormat::Json {
        return print_json(&intent);
    }
    println!(
        "{}",
        Theme::success(&format!(
            "Session {} is working on {} ({})",
            Theme::session_id(session),
            intent.id,
            intent.name
        ))
    );
    Ok(())
}

/// `warden intent show <session>`
pub(crate) fn show_intent(
    workspace: &Workspace,
    session: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let session_id = SessionId::new(session);
    let binding = workspace.registry.binding(&session_id);
    let intent = workspace.registry.active_intent(&session_id);

    if format == OutputFormat::Json {
        return print_json(&json!({ "binding": binding, "intent": intent }));
    }

    let Some(binding) = binding else {
        println!("{}", Theme::info("Session has no declarations"));
        return Ok(());
    };
    println!("\n{}", Theme::header("Session"));
    println!("{}", Theme::kv("Session", binding.session_id.as_str()));
    match (&binding.intent_id, &intent) {
        (Some(_), Some(intent)) => {
            println!("{}", Theme::kv("Intent", &format!("{} ({})", intent.id, intent.name)));
            println!("{}", Theme::kv("Status", &intent.status.to_string()));
            println!("{}", Theme::kv("Scope", &intent.owned_scope.join(", ")));
        },
        (Some(id), None) => println!(
            "{}",
            Theme::warning(&format!("Declared intent {id} is no longer active"))
        ),
        (None, _) => println!("{}", Theme::kv("Intent", "none")),
    }
    if let Some(at) = &binding.declared_at {
        println!("{}", Theme::kv("Declared", &Theme::timestamp(at)));
    }
    for (key, value) in &binding.metadata {
        println!("{}", Theme::kv(key, value));
    }
    println!();
    Ok(())
}

/// `warden intent clear <session>`
pub(crate) fn clear_intent(
    workspace: &Workspace,
    session: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let previous = workspace.registry.clear_intent(&SessionId::new(session))?;
    if format == OutputFormat::Json {
        return print_json(&json!({ "cleared": previous }));
    }
    match previous {
        Some(id) => println!("{}", Theme::success(&format!("Cleared intent {id}"))),
        None => println!("{}", Theme::dimmed("Nothing was declared")),
    }
    Ok(())
}

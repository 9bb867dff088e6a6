//! Classify command - show how a shell command would be gated.

use warden_approval::classify_command;

use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;

/// `warden classify <command...>`
pub(crate) fn run_classify(words: &[String], format: OutputFormat) -> anyhow::Result<()> {
    let command = words.join(" ");
    let classification = classify_command(&command);
    if format == OutputFormat::Json {
        return print_json(&classification);
    }

    println!("{}", Theme::kv("Command", &classification.command));
    println!("{}", Theme::kv("Risk", &Theme::risk_tier(classification.tier)));
    println!(
        "{}",
        Theme::kv(
            "Approval",
            if classification.requires_approval {
                "required"
            } else {
                "not required"
            }
        )
    );
    println!("{}", Theme::kv("Reason", &classification.reason));
    if let Some(mitigation) = &classification.mitigation {
        println!("{}", Theme::kv("Suggestion", mitigation));
    }
    Ok(())
}

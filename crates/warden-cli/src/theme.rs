//! CLI theme and styling.

use colored::Colorize;
use warden_core::RiskTier;

/// CLI theme configuration.
pub(crate) struct Theme;

impl Theme {
    /// Format a header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Format a success message.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Format an error message.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Format a warning message.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Format an info message.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    /// Format a dimmed message.
    pub(crate) fn dimmed(text: &str) -> String {
        format!("{}", text.dimmed())
    }

    /// Format a separator line.
    pub(crate) fn separator() -> String {
        "━".repeat(50).dimmed().to_string()
    }

    /// Format a key-value pair.
    pub(crate) fn kv(key: &str, value: &str) -> String {
        format!("{}: {}", key.bold(), value)
    }

    /// Format a risk tier.
    pub(crate) fn risk_tier(tier: RiskTier) -> String {
        match tier {
            RiskTier::Safe => "safe".green().to_string(),
            RiskTier::Medium => "medium".yellow().to_string(),
            RiskTier::High => "high".red().to_string(),
            RiskTier::Critical => "critical".red().bold().to_string(),
        }
    }

    /// Format a session ID (shortened).
    pub(crate) fn session_id(id: &str) -> String {
        let short = id.get(..8).unwrap_or(id);
        format!("{}", short.cyan())
    }

    /// Format a timestamp.
    pub(crate) fn timestamp(dt: &chrono::DateTime<chrono::Utc>) -> String {
        dt.format("%Y-%m-%d %H:%M:%S").to_string().dimmed().to_string()
    }
}

//! Warden CLI - intent-governed hooks for coding agents.
//!
//! The host agent calls `warden hook pre` before every tool call and
//! `warden hook post` after it, passing the call as JSON on stdin. The other
//! subcommands inspect intents, classify commands, and verify the trace.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod approval_handler;
mod commands;
mod config_bridge;
mod formatter;
mod theme;
mod workspace;

use commands::{classify, hook, intent, trace};
use formatter::OutputFormat;
use workspace::Workspace;

/// Warden - intent-governed tool hooks
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,

    /// Workspace root (defaults to the current directory)
    #[arg(short = 'C', long, global = true, env = "WARDEN_WORKSPACE")]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hook entry points for the host agent
    Hook {
        #[command(subcommand)]
        command: HookCommands,
    },

    /// Inspect and declare intents
    Intent {
        #[command(subcommand)]
        command: IntentCommands,
    },

    /// Show the risk tier of a shell command
    Classify {
        /// The command to classify
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Read and verify the audit trace
    Trace {
        #[command(subcommand)]
        command: TraceCommands,
    },
}

#[derive(Subcommand)]
enum HookCommands {
    /// Validate a tool call before it runs (JSON on stdin)
    Pre,
    /// Record a finished tool call (JSON on stdin)
    Post,
}

#[derive(Subcommand)]
enum IntentCommands {
    /// List declared intents
    List,
    /// Bind a session to an intent
    Declare {
        /// Session ID
        session: String,
        /// Intent ID
        intent: String,
    },
    /// Show what a session has declared
    Show {
        /// Session ID
        session: String,
    },
    /// Forget a session's declaration
    Clear {
        /// Session ID
        session: String,
    },
}

#[derive(Subcommand)]
enum TraceCommands {
    /// Print recent trace records
    Show {
        /// Only records from this session
        #[arg(short, long)]
        session: Option<String>,
        /// Maximum number of records
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Re-hash recorded ranges against the files on disk
    Check,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let root = match cli.workspace {
        Some(root) => root,
        None => std::env::current_dir().context("cannot determine the current directory")?,
    };
    let loaded = warden_config::load(Some(&root), None)?;
    // Logging defaults to stderr; stdout carries hook results.
    if let Err(e) = warden_telemetry::setup_logging(&config_bridge::to_log_config(
        &loaded.config,
        &root,
        cli.verbose,
    )) {
        eprintln!("{}", theme::Theme::warning(&format!("Logging disabled: {e}")));
    }
    tracing::debug!(files = ?loaded.loaded_files, "Configuration loaded");

    let workspace = Workspace::open(&root, loaded.config);
    let format = cli.format;

    match cli.command {
        Commands::Hook { command } => match command {
            HookCommands::Pre => hook::run_pre(&workspace).await,
            HookCommands::Post => hook::run_post(&workspace).await,
        },
        Commands::Intent { command } => {
            match command {
                IntentCommands::List => intent::list_intents(&workspace, format)?,
                IntentCommands::Declare { session, intent } => {
                    intent::declare_intent(&workspace, &session, &intent, format)?;
                },
                IntentCommands::Show { session } => {
                    intent::show_intent(&workspace, &session, format)?;
                },
                IntentCommands::Clear { session } => {
                    intent::clear_intent(&workspace, &session, format)?;
                },
            }
            Ok(ExitCode::SUCCESS)
        },
        Commands::Classify { command } => {
            classify::run_classify(&command, format)?;
            Ok(ExitCode::SUCCESS)
        },
        Commands::Trace { command } => match command {
            TraceCommands::Show { session, limit } => {
                trace::show_trace(&workspace, session.as_deref(), limit, format)?;
                Ok(ExitCode::SUCCESS)
            },
            TraceCommands::Check => {
                if trace::check_trace(&workspace, format)? {
                    Ok(ExitCode::SUCCESS)
                } else {
                    Ok(ExitCode::FAILURE)
                }
            },
        },
    }
}

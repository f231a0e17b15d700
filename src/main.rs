//! # AutoScore — Classroom Auto-Score Rule Engine
//!
//! Runs scoring automation rules against a classroom roster: per-rule timers,
//! trigger evaluation, and score/tag actions, persisted as a versioned JSON
//! rule document.
//!
//! Usage:
//!   autoscore run                         # Run the engine until Ctrl-C
//!   autoscore list                        # Show all rules
//!   autoscore add rule.json               # Add a rule from a JSON file
//!   autoscore toggle 3 --off              # Disable rule 3
//!   autoscore status                      # Engine status

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use autoscore_core::types::RuleInput;
use autoscore_core::AutoScoreConfig;
use autoscore_engine::AutoScoreService;

mod collab;

#[derive(Parser)]
#[command(
    name = "autoscore",
    version,
    about = "🏫 AutoScore — classroom auto-score rule engine"
)]
struct Cli {
    /// Config file (default: ~/.autoscore/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory override
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the engine until Ctrl-C
    Run,
    /// List all rules
    List,
    /// Add a rule from a JSON file
    Add {
        /// Path to a rule JSON file
        file: PathBuf,
    },
    /// Delete a rule by id
    Delete { id: u64 },
    /// Enable or disable a rule
    Toggle {
        id: u64,
        /// Disable instead of enable
        #[arg(long)]
        off: bool,
    },
    /// Show engine status
    Status,
    /// List available trigger and action kinds
    Kinds,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AutoScoreConfig::load_from(path)?,
        None => AutoScoreConfig::load()?,
    };
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }

    let filter = if cli.verbose {
        "autoscore=debug".to_string()
    } else {
        config.log_filter.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let files = Arc::new(collab::DataDirFiles::new(&config)?);
    let service = AutoScoreService::new(
        files,
        Arc::new(collab::JsonSettings::new(&config)),
        Arc::new(collab::JsonRoster::new(&config)),
        Arc::new(collab::JsonLedger::new(&config)),
        Arc::new(collab::LocalAdminGate),
        &config,
    );

    match cli.command {
        Command::Run => {
            service.start().await?;
            println!("🏫 AutoScore v{}", env!("CARGO_PKG_VERSION"));
            println!("   📂 Data Dir: {}", config.data_dir.display());
            println!("   Press Ctrl-C to stop.");
            tokio::signal::ctrl_c().await?;
            service.shutdown();
        }
        Command::List => {
            service.load().await?;
            let rules = service.get_rules().await?;
            if rules.is_empty() {
                println!("No rules.");
            }
            for rule in rules {
                let state = if rule.enabled { "✅" } else { "⏸️ " };
                let scope = if rule.student_names.is_empty() {
                    "all students".to_string()
                } else {
                    rule.student_names.join(", ")
                };
                println!("{state} [{}] {} → {scope}", rule.id, rule.name);
                for trigger in &rule.triggers {
                    println!("      when {} = {:?}", trigger.kind, trigger.value);
                }
                for action in &rule.actions {
                    println!("      then {} = {:?}", action.kind, action.value);
                }
                if let Some(at) = rule.last_executed {
                    println!("      last executed {at}");
                }
            }
        }
        Command::Add { file } => {
            service.load().await?;
            let text = std::fs::read_to_string(&file)?;
            let input: RuleInput = serde_json::from_str(&text)?;
            let id = service.add_rule(input).await?;
            println!("✅ Rule added with id {id}");
        }
        Command::Delete { id } => {
            service.load().await?;
            if service.delete_rule(id).await? {
                println!("✅ Rule {id} deleted");
            } else {
                println!("⚠️  No rule with id {id}");
            }
        }
        Command::Toggle { id, off } => {
            service.load().await?;
            if service.toggle_rule(id, !off).await? {
                println!("✅ Rule {id} {}", if off { "disabled" } else { "enabled" });
            } else {
                println!("⚠️  No rule with id {id}");
            }
        }
        Command::Status => {
            service.load().await?;
            let status = service.status().await?;
            let rules = service.get_rules().await?;
            println!(
                "Engine: {} ({} rule(s))",
                if status.enabled { "enabled" } else { "idle" },
                rules.len()
            );
        }
        Command::Kinds => {
            println!("Triggers:");
            for (label, kind) in service.trigger_options() {
                println!("   {kind:<24} {label}");
            }
            println!("Actions:");
            for (label, kind) in service.action_options() {
                println!("   {kind:<24} {label}");
            }
        }
    }

    Ok(())
}

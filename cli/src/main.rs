// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # apexion
//!
//! Terminal entry point for the interactive coding agent. Defaults to the
//! REPL (reading prompts from stdin, driving the agent loop turn after
//! turn); `apexion config` manages `~/.config/apexion/config.yaml`;
//! `--print <PROMPT>` runs a single non-interactive turn and exits,
//! emitting JSONL events via `PipeIo` for machine consumption.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use apexion_cli::commands::ConfigCommand;
use apexion_cli::io::PipeIo;
use apexion_cli::{commands, config as config_loader, repl};

/// Apexion — an interactive coding agent driven by a tool-calling model loop.
#[derive(Parser)]
#[command(name = "apexion")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery, §6)
    #[arg(short, long, global = true, env = "APEXION_CONFIG_PATH", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "APEXION_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Run a single prompt non-interactively and exit, emitting JSONL
    /// events on stdout instead of rendering to a terminal
    #[arg(long, value_name = "PROMPT")]
    print: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Best-effort: a missing .env is normal, not an error.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    if let Some(Commands::Config { command }) = cli.command {
        return commands::config::handle_command(command, cli.config).await;
    }

    let config = config_loader::load(cli.config).context("failed to load configuration")?;
    if config.active_provider().is_none() {
        eprintln!(
            "{}",
            format!(
                "No configuration found for active provider '{}'. Run `apexion config generate` to create one.",
                config.provider
            )
            .yellow()
        );
    }

    if let Some(prompt) = cli.print {
        let io: Arc<dyn apexion_core::domain::io::Io> = Arc::new(PipeIo::new());
        let session = repl::build_session(config, io).await?;
        repl::run_once(session, prompt).await;
        return Ok(());
    }

    let io = apexion_cli::io::default_for_terminal();

    info!("apexion starting");
    let session = repl::build_session(config, io).await?;
    repl::run(session).await;

    Ok(())
}

/// Initialize the `tracing` subscriber (kept from the teacher's
/// `init_logging`, unchanged in shape).
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

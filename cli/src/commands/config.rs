// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands: show, validate, generate (§6).

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use crate::config as config_loader;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (file + env overrides merged)
    Show {
        /// Also print the discovery paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate a configuration file without starting a session
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write a starter configuration file
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./apexion.yaml")]
        output: PathBuf,

        /// Include commented examples for every section
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, examples } => generate(output, examples),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = config_loader::load(config_override.clone()).context("failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery order:".bold());
        println!("  1. --config flag");
        println!("  2. APEXION_CONFIG_PATH env var");
        println!("  3. ./apexion.yaml, ./apexion-config.yaml");
        println!("  4. ~/.config/apexion/config.yaml");
        println!("  5. /etc/apexion/config.yaml");
        println!();
    }

    println!("{}", "Active provider:".bold());
    println!("  {} ({})", config.provider, if config.active_provider().is_some() { "configured" } else { "missing entry" });
    println!();

    println!("{}", "Providers:".bold());
    for (name, provider) in &config.providers {
        println!("  {} -> model {}", name.bold(), provider.model);
    }
    println!();

    println!("{}", "Permissions:".bold());
    println!("  mode: {:?}", config.permissions.mode);
    println!("  allowed_commands: {}", config.permissions.allowed_commands.len());
    println!("  denied_commands: {}", config.permissions.denied_commands.len());
    println!("  allowed_paths: {}", config.permissions.allowed_paths.len());
    println!();

    println!("{}", "Session:".bold());
    println!("  max_iterations: {} ({})", config.max_iterations, if config.max_iterations == 0 { "unlimited" } else { "capped" });
    println!("  context_window: {}", config.context_window);
    println!("  auto_commit: {}", config.auto_commit);
    println!("  lint enabled: {}", config.lint.enabled);
    println!("  test enabled: {}", config.test.enabled);
    println!("  mcp servers: {}", config.mcp_servers.len());

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");
    let config = config_loader::load(config_path).context("failed to load configuration")?;

    if config.active_provider().is_none() {
        println!("{}", format!("✗ active provider '{}' has no matching entry under providers:", config.provider).red());
        anyhow::bail!("configuration invalid: no active provider entry");
    }
    if let Some(provider) = config.active_provider() {
        if provider.model.is_empty() {
            println!("{}", "✗ active provider has no model configured".red());
            anyhow::bail!("configuration invalid: empty model");
        }
    }

    println!("{}", "✓ configuration is valid".green());
    Ok(())
}

fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample).with_context(|| format!("failed to write config to {}", output.display()))?;

    println!("{}", format!("✓ configuration generated: {}", output.display()).green());
    Ok(())
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Interactive terminal renderer: line-based input via `tokio::io::stdin`,
//! confirmation prompts via `dialoguer` (the teacher already depends on
//! `dialoguer`/`colored` in `cli/Cargo.toml` for its own terminal output).

use async_trait::async_trait;
use colored::Colorize;
use parking_lot::Mutex;
use std::io::Write;

use apexion_core::domain::io::Io;
use apexion_core::domain::message::ToolCallId;
use apexion_core::domain::tool::PermissionLevel;

pub struct InteractiveIo {
    /// Tracks whether a `thinking_start` is still open so `text_delta`
    /// can print a leading newline exactly once.
    printed_thinking: Mutex<bool>,
}

impl InteractiveIo {
    pub fn new() -> Self {
        Self { printed_thinking: Mutex::new(false) }
    }

    fn level_color(level: PermissionLevel, text: &str) -> colored::ColoredString {
        match level {
            PermissionLevel::Read => text.green(),
            PermissionLevel::Write => text.yellow(),
            PermissionLevel::Execute => text.yellow(),
            PermissionLevel::Dangerous => text.red(),
        }
    }
}

impl Default for InteractiveIo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Io for InteractiveIo {
    async fn read_input(&self) -> Option<String> {
        print!("{} ", "›".cyan().bold());
        std::io::stdout().flush().ok();
        tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            match std::io::stdin().read_line(&mut line) {
                Ok(0) => None,
                Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_string()),
                Err(_) => None,
            }
        })
        .await
        .unwrap_or(None)
    }

    fn user_message(&self, text: &str) {
        println!("{} {}", "›".cyan().bold(), text);
    }

    fn thinking_start(&self) {
        *self.printed_thinking.lock() = false;
        print!("{}", "· thinking…".dimmed());
        std::io::stdout().flush().ok();
    }

    fn text_delta(&self, text: &str) {
        let mut first = self.printed_thinking.lock();
        if !*first {
            print!("\r{}\r", " ".repeat(16));
            *first = true;
        }
        print!("{text}");
        std::io::stdout().flush().ok();
    }

    fn text_done(&self, _full: &str) {
        println!();
    }

    fn tool_start(&self, _id: ToolCallId, name: &str, params: &serde_json::Value) {
        println!("{} {}({})", "→".blue(), name.bold(), compact_params(params));
    }

    fn tool_done(&self, _id: ToolCallId, name: &str, result: &str, is_error: bool) {
        let marker = if is_error { "✗".red() } else { "✓".green() };
        let preview: String = result.chars().take(120).collect();
        println!("  {marker} {name} {}", preview.dimmed());
    }

    async fn confirm(&self, name: &str, params: &serde_json::Value, level: PermissionLevel) -> bool {
        let prompt = format!("Allow {name}({})?", compact_params(params));
        let colored_prompt = Self::level_color(level, &prompt);
        tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::new()
                .with_prompt(colored_prompt.to_string())
                .default(false)
                .interact()
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }

    async fn ask_question(&self, question: &str, options: &[String]) -> String {
        let question = question.to_string();
        let options = options.to_vec();
        tokio::task::spawn_blocking(move || {
            if options.is_empty() {
                dialoguer::Input::<String>::new().with_prompt(question).interact_text().unwrap_or_default()
            } else {
                let idx = dialoguer::Select::new().with_prompt(question).items(&options).default(0).interact().unwrap_or(0);
                options.get(idx).cloned().unwrap_or_default()
            }
        })
        .await
        .unwrap_or_default()
    }

    fn system_message(&self, text: &str) {
        println!("{} {}", "·".dimmed(), text.dimmed());
    }

    fn error(&self, text: &str) {
        eprintln!("{} {}", "✗".red().bold(), text.red());
    }

    fn set_tokens(&self, _n: u32) {}
    fn set_context_info(&self, _used: u32, _total: u32) {}
    fn set_plan_mode(&self, _enabled: bool) {}
    fn set_cost(&self, _dollars: f64) {}
}

fn compact_params(params: &serde_json::Value) -> String {
    let s = params.to_string();
    if s.chars().count() > 80 {
        format!("{}…", s.chars().take(77).collect::<String>())
    } else {
        s
    }
}

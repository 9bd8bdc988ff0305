// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Plain non-tty fallback: no color, no cursor tricks, a `y/n` line
//! prompt for confirmations instead of `dialoguer`'s interactive widgets.
//! Used when stdout/stdin aren't both a terminal (piped input, a log
//! file, a CI runner without `--print`).

use async_trait::async_trait;
use std::io::Write;

use apexion_core::domain::io::Io;
use apexion_core::domain::message::ToolCallId;
use apexion_core::domain::tool::PermissionLevel;

#[derive(Default)]
pub struct PlainIo;

impl PlainIo {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Io for PlainIo {
    async fn read_input(&self) -> Option<String> {
        print!("> ");
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
        println!("> {text}");
    }

    fn thinking_start(&self) {
        println!("[thinking]");
    }

    fn text_delta(&self, text: &str) {
        print!("{text}");
        std::io::stdout().flush().ok();
    }

    fn text_done(&self, _full: &str) {
        println!();
    }

    fn tool_start(&self, _id: ToolCallId, name: &str, params: &serde_json::Value) {
        println!("[tool] {name} {params}");
    }

    fn tool_done(&self, _id: ToolCallId, name: &str, result: &str, is_error: bool) {
        let tag = if is_error { "error" } else { "ok" };
        println!("[tool:{tag}] {name}: {result}");
    }

    async fn confirm(&self, name: &str, params: &serde_json::Value, _level: PermissionLevel) -> bool {
        print!("Allow {name}({params})? [y/N] ");
        std::io::stdout().flush().ok();
        tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).ok();
            matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
        })
        .await
        .unwrap_or(false)
    }

    async fn ask_question(&self, question: &str, options: &[String]) -> String {
        if options.is_empty() {
            println!("{question}");
        } else {
            println!("{question} ({})", options.join(", "));
        }
        print!("> ");
        std::io::stdout().flush().ok();
        tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).ok();
            line.trim().to_string()
        })
        .await
        .unwrap_or_default()
    }

    fn system_message(&self, text: &str) {
        println!("[system] {text}");
    }

    fn error(&self, text: &str) {
        eprintln!("[error] {text}");
    }

    fn set_tokens(&self, _n: u32) {}
    fn set_context_info(&self, _used: u32, _total: u32) {}
    fn set_plan_mode(&self, _enabled: bool) {}
    fn set_cost(&self, _dollars: f64) {}
}

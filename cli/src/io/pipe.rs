// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Pipe/CI renderer (`--print`): auto-approves every confirmation (no
//! human attached) and emits one JSON object per line to stdout for every
//! event, so a wrapping process can consume the turn programmatically.
//! Grounded in the common "CI renderer" shape across the retrieval pack's
//! agent loops (SPEC_FULL §9 supplemented features).

use async_trait::async_trait;
use serde_json::json;
use std::io::Write;

use apexion_core::domain::io::Io;
use apexion_core::domain::message::ToolCallId;
use apexion_core::domain::tool::PermissionLevel;

#[derive(Default)]
pub struct PipeIo;

impl PipeIo {
    pub fn new() -> Self {
        Self
    }

    fn emit(&self, event: serde_json::Value) {
        if let Ok(line) = serde_json::to_string(&event) {
            let mut stdout = std::io::stdout();
            let _ = writeln!(stdout, "{line}");
        }
    }
}

#[async_trait]
impl Io for PipeIo {
    async fn read_input(&self) -> Option<String> {
        // `--print` is single-shot: the caller supplies the prompt once
        // via argv, not over stdin, so there is nothing further to read.
        None
    }

    fn user_message(&self, text: &str) {
        self.emit(json!({"event": "user_message", "text": text}));
    }

    fn thinking_start(&self) {
        self.emit(json!({"event": "thinking_start"}));
    }

    fn text_delta(&self, text: &str) {
        self.emit(json!({"event": "text_delta", "text": text}));
    }

    fn text_done(&self, full: &str) {
        self.emit(json!({"event": "text_done", "text": full}));
    }

    fn tool_start(&self, id: ToolCallId, name: &str, params: &serde_json::Value) {
        self.emit(json!({"event": "tool_start", "id": id.to_string(), "name": name, "params": params}));
    }

    fn tool_done(&self, id: ToolCallId, name: &str, result: &str, is_error: bool) {
        self.emit(json!({"event": "tool_done", "id": id.to_string(), "name": name, "result": result, "is_error": is_error}));
    }

    /// No human is attached in pipe mode: every `NeedConfirmation`
    /// decision is auto-approved, but still logged so a reviewing human
    /// can audit what ran.
    async fn confirm(&self, name: &str, params: &serde_json::Value, level: PermissionLevel) -> bool {
        self.emit(json!({"event": "auto_confirm", "name": name, "params": params, "level": format!("{level:?}")}));
        true
    }

    async fn ask_question(&self, question: &str, options: &[String]) -> String {
        self.emit(json!({"event": "ask_question", "question": question, "options": options}));
        options.first().cloned().unwrap_or_default()
    }

    fn system_message(&self, text: &str) {
        self.emit(json!({"event": "system_message", "text": text}));
    }

    fn error(&self, text: &str) {
        self.emit(json!({"event": "error", "text": text}));
    }

    fn set_tokens(&self, n: u32) {
        self.emit(json!({"event": "tokens", "n": n}));
    }

    fn set_context_info(&self, used: u32, total: u32) {
        self.emit(json!({"event": "context_info", "used": used, "total": total}));
    }

    fn set_plan_mode(&self, enabled: bool) {
        self.emit(json!({"event": "plan_mode", "enabled": enabled}));
    }

    fn set_cost(&self, dollars: f64) {
        self.emit(json!({"event": "cost", "dollars": dollars}));
    }
}

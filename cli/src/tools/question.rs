// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `question` — present a structured multiple-choice question to the user
//! and return their answer. Grounded in the teacher pack's `sven-tools`
//! `AskQuestionTool`, simplified to a single question per call (one
//! `prompt` + `options`) since our `Io::ask_question` port already has
//! that shape — the teacher's batched-questions/TUI-channel plumbing has
//! no counterpart here. Excluded from the `Code` sub-agent registry
//! (§4.1) so nested agents never block on user input.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use apexion_core::domain::io::Io;
use apexion_core::domain::tool::{PermissionLevel, Tool, ToolError, ToolResult};
use std::sync::Arc;

pub struct QuestionTool {
    io: Arc<dyn Io>,
}

impl QuestionTool {
    pub fn new(io: Arc<dyn Io>) -> Self {
        Self { io }
    }
}

#[async_trait]
impl Tool for QuestionTool {
    fn name(&self) -> &str {
        "question"
    }

    fn description(&self) -> &str {
        "Presents a multiple-choice question to the user and returns their answer.\n\
         prompt: the question text. options: at least two choices. Use for decisions\n\
         that genuinely require the user's explicit input — not for yes/no confirmations,\n\
         which should just be asked directly in text."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "prompt": {"type": "string", "description": "The question to ask"},
            "options": {
                "type": "array",
                "items": {"type": "string"},
                "description": "At least two answer choices"
            }
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Read
    }

    async fn execute(&self, _cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError> {
        let prompt = params
            .get("prompt")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParams("missing required parameter 'prompt'".to_string()))?;
        let options: Vec<String> = params
            .get("options")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        if options.len() < 2 {
            return Err(ToolError::InvalidParams("'options' must contain at least two choices".to_string()));
        }

        debug!(prompt, option_count = options.len(), "question");

        let answer = self.io.ask_question(prompt, &options).await;
        Ok(ToolResult::ok(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apexion_core::domain::message::ToolCallId;

    struct StubIo {
        answer: String,
    }

    #[async_trait]
    impl Io for StubIo {
        async fn read_input(&self) -> Option<String> {
            None
        }
        fn user_message(&self, _text: &str) {}
        fn thinking_start(&self) {}
        fn text_delta(&self, _text: &str) {}
        fn text_done(&self, _full: &str) {}
        fn tool_start(&self, _id: ToolCallId, _name: &str, _params: &Value) {}
        fn tool_done(&self, _id: ToolCallId, _name: &str, _result: &str, _is_error: bool) {}
        async fn confirm(&self, _name: &str, _params: &Value, _level: PermissionLevel) -> bool {
            true
        }
        async fn ask_question(&self, _question: &str, _options: &[String]) -> String {
            self.answer.clone()
        }
        fn system_message(&self, _text: &str) {}
        fn error(&self, _text: &str) {}
        fn set_tokens(&self, _n: u32) {}
        fn set_context_info(&self, _used: u32, _total: u32) {}
        fn set_plan_mode(&self, _enabled: bool) {}
        fn set_cost(&self, _dollars: f64) {}
    }

    #[tokio::test]
    async fn returns_the_ios_answer() {
        let tool = QuestionTool::new(Arc::new(StubIo { answer: "yes".to_string() }));
        let result = tool
            .execute(CancellationToken::new(), json!({"prompt": "Proceed?", "options": ["yes", "no"]}))
            .await
            .unwrap();
        assert_eq!(result.content, "yes");
    }

    #[tokio::test]
    async fn fewer_than_two_options_is_invalid_params() {
        let tool = QuestionTool::new(Arc::new(StubIo { answer: "x".to_string() }));
        let err = tool
            .execute(CancellationToken::new(), json!({"prompt": "Proceed?", "options": ["yes"]}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn missing_prompt_is_invalid_params() {
        let tool = QuestionTool::new(Arc::new(StubIo { answer: "x".to_string() }));
        let err = tool.execute(CancellationToken::new(), json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }
}

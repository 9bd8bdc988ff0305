//! Io
//!
//! The narrow port the agent loop and executor use to talk to a human
//! (§6). Three concrete renderers live in the `cli` crate: an interactive
//! terminal, a plain non-tty fallback, and a pipe/CI renderer.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** UI/IO port (component I).

use async_trait::async_trait;

use super::message::ToolCallId;
use super::tool::PermissionLevel;

#[async_trait]
pub trait Io: Send + Sync {
    async fn read_input(&self) -> Option<String>;

    fn user_message(&self, text: &str);
    fn thinking_start(&self);
    fn text_delta(&self, text: &str);
    fn text_done(&self, full: &str);

    fn tool_start(&self, id: ToolCallId, name: &str, params: &serde_json::Value);
    fn tool_done(&self, id: ToolCallId, name: &str, result: &str, is_error: bool);

    /// Gates a `NeedConfirmation` decision. `level` lets the renderer
    /// colour the prompt by how dangerous the call is.
    async fn confirm(&self, name: &str, params: &serde_json::Value, level: PermissionLevel) -> bool;

    async fn ask_question(&self, question: &str, options: &[String]) -> String;

    fn system_message(&self, text: &str);
    fn error(&self, text: &str);

    fn set_tokens(&self, n: u32);
    fn set_context_info(&self, used: u32, total: u32);
    fn set_plan_mode(&self, enabled: bool);
    fn set_cost(&self, dollars: f64);
}

//! Message
//!
//! Conversation transcript types shared by the agent loop, the provider
//! port, and the sub-agent buffer IO.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Defines the Message/content-block model the rest of the
//!   crate is built around.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for a tool call, unique within one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallId(Uuid);

impl ToolCallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ToolCallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ToolCallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Raster image formats the image content block may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMediaType {
    Png,
    Jpeg,
    Gif,
    Webp,
}

/// A single piece of a message. Assistant turns may mix text and
/// `tool_use` blocks; tool turns carry exactly one `tool_result` block
/// per dispatched call (see T-Balance in the integration tests).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse {
        id: ToolCallId,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: ToolCallId,
        content: String,
        is_error: bool,
    },
    Image {
        media_type: ImageMediaType,
        /// Base64-encoded image bytes.
        data: String,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_use(id: ToolCallId, name: impl Into<String>, input: serde_json::Value) -> Self {
        ContentBlock::ToolUse { id, name: name.into(), input }
    }

    pub fn tool_result(tool_use_id: ToolCallId, content: impl Into<String>, is_error: bool) -> Self {
        ContentBlock::ToolResult { tool_use_id, content: content.into(), is_error }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: vec![ContentBlock::text(text)] }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: vec![ContentBlock::text(text)] }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self { role: Role::Assistant, content }
    }

    /// Tool results are always sent back as a `user`-role message per the
    /// provider wire format convention (tool_result blocks never appear on
    /// an assistant-role message).
    pub fn tool_results(content: Vec<ContentBlock>) -> Self {
        Self { role: Role::User, content }
    }

    pub fn tool_uses(&self) -> impl Iterator<Item = (&ToolCallId, &str, &serde_json::Value)> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some((id, name.as_str(), input)),
            _ => None,
        })
    }

    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_uses_extracts_only_tool_use_blocks() {
        let id = ToolCallId::new();
        let msg = Message::assistant(vec![
            ContentBlock::text("let me check"),
            ContentBlock::tool_use(id, "read_file", serde_json::json!({"path": "a.rs"})),
        ]);
        let uses: Vec<_> = msg.tool_uses().collect();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].1, "read_file");
    }

    #[test]
    fn text_joins_only_text_blocks() {
        let msg = Message::assistant(vec![
            ContentBlock::text("a"),
            ContentBlock::tool_use(ToolCallId::new(), "x", serde_json::json!({})),
            ContentBlock::text("b"),
        ]);
        assert_eq!(msg.text(), "ab");
    }
}

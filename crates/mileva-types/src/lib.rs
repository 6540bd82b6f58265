//! Shared types for the Mileva voice agent.
//!
//! This crate provides the value types exchanged between the voice
//! framework (`mileva-voice`) and the worker (`mileva-agent`): PCM audio
//! frames, chat messages in the OpenAI chat-completions shape, and the
//! tool calls a language model emits.
//!
//! No crate in the workspace depends on anything *except* `mileva-types` for
//! cross-cutting type definitions. This keeps the dependency graph flat.

use serde::{Deserialize, Serialize};

pub mod audio;

pub use audio::AudioFrame;

/// Speaker role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The persona instructions.
    System,
    /// The remote participant.
    User,
    /// The agent.
    Assistant,
    /// The output of a tool call.
    Tool,
}

impl ChatRole {
    /// Returns the wire label for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

fn function_kind() -> String {
    "function".to_string()
}

/// The function half of a tool call: a name and JSON-encoded arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Arguments as the raw JSON string produced by the model.
    #[serde(default)]
    pub arguments: String,
}

/// A tool call requested by the language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Some local servers omit this; the LLM client fills it in.
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// One entry in a conversation's chat context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(ChatRole::Assistant, content)
    }

    /// An assistant turn that requests tool calls (content may be empty).
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    /// The output of the tool call identified by `tool_call_id`.
    pub fn tool_output(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_labels_match_wire_format() {
        for role in [
            ChatRole::System,
            ChatRole::User,
            ChatRole::Assistant,
            ChatRole::Tool,
        ] {
            let json = serde_json::to_value(role).unwrap();
            assert_eq!(json, role.as_str());
        }
    }

    #[test]
    fn plain_message_omits_tool_fields() {
        let json = serde_json::to_value(ChatMessage::user("hello")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn tool_output_carries_call_id() {
        let json = serde_json::to_value(ChatMessage::tool_output("call_1", "42")).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
        assert_eq!(json["content"], "42");
    }

    #[test]
    fn tool_call_defaults_kind_when_missing() {
        let call: ToolCall = serde_json::from_value(serde_json::json!({
            "id": "call_9",
            "function": {"name": "multiply_numbers", "arguments": "{}"}
        }))
        .unwrap();
        assert_eq!(call.kind, "function");
        assert_eq!(call.function.name, "multiply_numbers");
    }

    #[test]
    fn tool_call_id_may_be_missing() {
        let call: ToolCall = serde_json::from_value(serde_json::json!({
            "function": {"name": "multiply_numbers", "arguments": "{}"}
        }))
        .unwrap();
        assert!(call.id.is_empty());
    }
}

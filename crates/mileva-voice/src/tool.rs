//! Function tools the language model may call during a conversation.

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("tool '{0}' is not available")]
    NotFound(String),

    #[error("tool '{tool}' failed: {reason}")]
    Failed { tool: String, reason: String },
}

/// Context handed to a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub session_id: Uuid,
    pub room: String,
}

/// A callable exposed to the model through OpenAI function calling.
#[async_trait]
pub trait FunctionTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    async fn call(&self, ctx: &RunContext, arguments: Value) -> Result<String, ToolError>;
}

/// Renders a tool as an OpenAI function definition.
pub fn openai_definition(tool: &dyn FunctionTool) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name(),
            "description": tool.description(),
            "parameters": tool.parameters(),
        }
    })
}

/// Parses the raw argument string a model produced. An empty string is an
/// empty object.
pub fn parse_arguments(tool: &str, raw: &str) -> Result<Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl FunctionTool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input."
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn call(&self, _ctx: &RunContext, arguments: Value) -> Result<String, ToolError> {
            Ok(arguments.to_string())
        }
    }

    #[test]
    fn definition_uses_function_shape() {
        let def = openai_definition(&Echo);
        assert_eq!(def["type"], "function");
        assert_eq!(def["function"]["name"], "echo");
        assert_eq!(def["function"]["description"], "Echo the input.");
        assert_eq!(def["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn empty_arguments_parse_as_object() {
        assert_eq!(parse_arguments("echo", "  ").unwrap(), json!({}));
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        let err = parse_arguments("echo", "{number1: 2").unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { ref tool, .. } if tool == "echo"));
    }
}

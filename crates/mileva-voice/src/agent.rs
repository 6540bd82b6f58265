use crate::tool::{openai_definition, FunctionTool};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A persona: fixed instructions plus the tools the model may call.
///
/// The instructions are opaque to the session; they are sent verbatim as the
/// system message of every completion request.
#[derive(Clone)]
pub struct Agent {
    instructions: String,
    tools: Vec<Arc<dyn FunctionTool>>,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("instructions_len", &self.instructions.len())
            .field(
                "tools",
                &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Agent {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            tools: Vec::new(),
        }
    }

    /// Registers a tool. A later tool with the same name replaces the earlier one.
    pub fn with_tool(mut self, tool: impl FunctionTool + 'static) -> Self {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn tools(&self) -> &[Arc<dyn FunctionTool>] {
        &self.tools
    }

    pub fn find_tool(&self, name: &str) -> Option<Arc<dyn FunctionTool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// OpenAI function definitions for every registered tool.
    pub fn tool_definitions(&self) -> Vec<Value> {
        self.tools.iter().map(|t| openai_definition(t.as_ref())).collect()
    }
}

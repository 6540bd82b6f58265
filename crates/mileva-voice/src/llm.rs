//! Language-model provider speaking the OpenAI chat-completions API.
//!
//! Works against llama.cpp's server, vLLM, Ollama and any other backend that
//! implements `/chat/completions` with function calling.

use crate::config::ProviderEndpoint;
use crate::error::VoiceError;
use async_trait::async_trait;
use mileva_types::{ChatMessage, ToolCall};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Timeout for a single completion request.
const LLM_TIMEOUT: Duration = Duration::from_secs(90);

const THINK_OPEN_TAGS: [&str; 2] = ["<thinking>", "<think>"];
const THINK_CLOSE_TAGS: [&str; 2] = ["</thinking>", "</think>"];

/// The assistant turn produced by one completion request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatCompletion {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Language-model provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Requests one assistant turn. `tools` are OpenAI function definitions.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<ChatCompletion, VoiceError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [Value],
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    stream: bool,
}

fn no_tools(tools: &&[Value]) -> bool {
    tools.is_empty()
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiLlm {
    endpoint: ProviderEndpoint,
    client: Client,
}

impl OpenAiLlm {
    pub fn new(endpoint: ProviderEndpoint) -> Result<Self, VoiceError> {
        let client = Client::builder()
            .timeout(LLM_TIMEOUT)
            .build()
            .map_err(|e| VoiceError::Config(format!("failed to build LLM client: {}", e)))?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &ProviderEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl LanguageModel for OpenAiLlm {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<ChatCompletion, VoiceError> {
        let request = CompletionRequest {
            model: &self.endpoint.model,
            messages,
            tools,
            tool_choice: (!tools.is_empty()).then_some("auto"),
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint.url("chat/completions"))
            .bearer_auth(&self.endpoint.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Llm(format!(
                "completion failed (HTTP {}): {}",
                status, body
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::Llm(format!("invalid completion response: {}", e)))?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| VoiceError::Llm("completion returned no choices".to_string()))?;

        let completion = ChatCompletion {
            content: message.content.filter(|c| !c.is_empty()),
            tool_calls: message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(with_call_id)
                .collect(),
        };
        debug!(
            model = %self.endpoint.model,
            tool_calls = completion.tool_calls.len(),
            "completion received"
        );
        Ok(completion)
    }
}

/// Tool outputs are matched to calls by id, so a call without one gets a
/// fresh id.
fn with_call_id(mut call: ToolCall) -> ToolCall {
    if call.id.trim().is_empty() {
        call.id = format!("call_{}", Uuid::new_v4().simple());
    }
    call
}

/// Removes `<think>…</think>` reasoning blocks that reasoning models (Qwen3,
/// DeepSeek-R1) emit inline. An unterminated block drops everything after
/// its opening tag.
pub fn strip_think_blocks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    loop {
        let open = THINK_OPEN_TAGS
            .iter()
            .filter_map(|tag| rest.find(tag).map(|pos| (pos, *tag)))
            .min_by_key(|(pos, _)| *pos);

        let Some((pos, tag)) = open else {
            out.push_str(rest);
            break;
        };

        out.push_str(&rest[..pos]);
        let after_open = &rest[pos + tag.len()..];

        let close = THINK_CLOSE_TAGS
            .iter()
            .filter_map(|tag| after_open.find(tag).map(|p| (p, *tag)))
            .min_by_key(|(p, _)| *p);

        match close {
            Some((p, close_tag)) => rest = &after_open[p + close_tag.len()..],
            None => break,
        }
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_closed_think_block() {
        let text = "<think>user wants a call</think>\n\nGreat. What does your week look like?";
        assert_eq!(
            strip_think_blocks(text),
            "Great. What does your week look like?"
        );
    }

    #[test]
    fn strips_unterminated_block() {
        assert_eq!(strip_think_blocks("Sure. <think>hmm, maybe"), "Sure.");
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(strip_think_blocks("  That makes sense.  "), "That makes sense.");
    }

    #[test]
    fn handles_thinking_variant_and_multiple_blocks() {
        let text = "<thinking>a</thinking>One. <think>b</think>Two.";
        assert_eq!(strip_think_blocks(text), "One. Two.");
    }

    #[test]
    fn missing_call_ids_are_generated() {
        let first = with_call_id(ToolCall::new("", "multiply_numbers", "{}"));
        let second = with_call_id(ToolCall::new("", "multiply_numbers", "{}"));
        assert!(first.id.starts_with("call_"));
        assert_ne!(first.id, second.id);

        let kept = with_call_id(ToolCall::new("call_1", "multiply_numbers", "{}"));
        assert_eq!(kept.id, "call_1");
    }

    #[test]
    fn request_omits_tools_when_none() {
        let messages = [ChatMessage::user("hi")];
        let request = CompletionRequest {
            model: "qwen3-4b",
            messages: &messages,
            tools: &[],
            tool_choice: None,
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
        assert_eq!(json["model"], "qwen3-4b");
    }
}

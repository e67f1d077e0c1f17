//! Language-model client abstraction.
//!
//! The pipeline only needs "messages in, text and optional tool calls out".
//! [`ChatCompletionsClient`] speaks the OpenAI-compatible chat-completions
//! dialect, which Gemini, OpenAI, OpenRouter and Ollama all expose.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{DeepCrewError, LlmError};
use crate::security::{SecretValue, redact};

/// Sampling temperature for every request; not configurable.
pub const SAMPLING_TEMPERATURE: f32 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    fn plain(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// One model turn: free text, tool calls, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Opaque completion service bound to one model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Produce the next assistant turn. `tools` may be empty.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<Completion, LlmError>;

    fn model_name(&self) -> &str;
}

/// HTTP client for OpenAI-compatible `/chat/completions` endpoints.
///
/// Holds no per-request state, so one instance is shared by every query.
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: SecretValue,
}

impl ChatCompletionsClient {
    pub fn new(config: &LlmConfig, api_key: SecretValue) -> Result<Self, DeepCrewError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| {
                DeepCrewError::InvalidConfiguration(format!("failed to build LLM client: {err}"))
            })?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
        })
    }

    fn request_body(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Value {
        let messages: Vec<Value> = messages.iter().map(wire_message).collect();
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": SAMPLING_TEMPERATURE,
        });

        if !tools.is_empty() {
            let tools: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
            body["tool_choice"] = json!("auto");
        }

        body
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<Completion, LlmError> {
        let body = self.request_body(messages, tools);
        debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "sending chat completion request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|err| LlmError::Transport(redact(&err.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: redact(&text),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| LlmError::Decode(err.to_string()))?;

        parse_completion(&payload)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn wire_message(message: &ChatMessage) -> Value {
    match message.role {
        ChatRole::Assistant if !message.tool_calls.is_empty() => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments.to_string(),
                        }
                    })
                })
                .collect();
            json!({
                "role": "assistant",
                "content": message.content,
                "tool_calls": calls,
            })
        }
        ChatRole::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
            "content": message.content,
        }),
        role => json!({
            "role": role,
            "content": message.content,
        }),
    }
}

/// Extract the first choice of a chat-completions payload.
pub fn parse_completion(payload: &Value) -> Result<Completion, LlmError> {
    let message = payload
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or(LlmError::EmptyResponse)?;

    let content = match message.get("content") {
        Some(Value::String(text)) => text.clone(),
        // Some backends return content as an array of typed parts.
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    };

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for (index, call) in calls.iter().enumerate() {
            let function = call
                .get("function")
                .ok_or_else(|| LlmError::Decode("tool call without function".to_string()))?;
            let name = function
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| LlmError::Decode("tool call without name".to_string()))?;
            let arguments = match function.get("arguments") {
                Some(Value::String(raw)) if raw.trim().is_empty() => json!({}),
                // Malformed argument JSON is kept as a raw string so the tool can
                // report it back to the model instead of failing the whole turn.
                Some(Value::String(raw)) => {
                    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
                }
                Some(other) => other.clone(),
                None => json!({}),
            };
            let id = call
                .get("id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("call_{index}"));

            tool_calls.push(ToolCall {
                id,
                name: name.to_string(),
                arguments,
            });
        }
    }

    Ok(Completion {
        content,
        tool_calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_choice() {
        let payload = json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        });
        let completion = parse_completion(&payload).unwrap();
        assert_eq!(completion, Completion::text("hello"));
        assert!(!completion.wants_tools());
    }

    #[test]
    fn parses_tool_calls_with_string_arguments() {
        let payload = json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [
                    {"id": "abc", "type": "function",
                     "function": {"name": "linkup_search", "arguments": "{\"query\":\"batteries\"}"}},
                    {"type": "function",
                     "function": {"name": "linkup_search", "arguments": "not json"}}
                ]
            }}]
        });
        let completion = parse_completion(&payload).unwrap();
        assert_eq!(completion.content, "");
        assert_eq!(completion.tool_calls.len(), 2);
        assert_eq!(completion.tool_calls[0].id, "abc");
        assert_eq!(completion.tool_calls[0].arguments["query"], "batteries");
        assert_eq!(completion.tool_calls[1].id, "call_1");
        assert_eq!(completion.tool_calls[1].arguments, json!("not json"));
    }

    #[test]
    fn missing_choices_is_an_error() {
        let err = parse_completion(&json!({"choices": []})).unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }

    #[test]
    fn wire_format_round_trips_tool_messages() {
        let call = ToolCall {
            id: "c1".into(),
            name: "linkup_search".into(),
            arguments: json!({"query": "x"}),
        };
        let assistant = wire_message(&ChatMessage::assistant("", vec![call]));
        assert_eq!(assistant["tool_calls"][0]["function"]["arguments"], "{\"query\":\"x\"}");

        let tool = wire_message(&ChatMessage::tool_result("c1", "result"));
        assert_eq!(tool["role"], "tool");
        assert_eq!(tool["tool_call_id"], "c1");

        let user = wire_message(&ChatMessage::user("hi"));
        assert_eq!(user, json!({"role": "user", "content": "hi"}));
    }
}

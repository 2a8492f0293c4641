use crate::agent::history::{Message, ToolCall};
use crate::core::{ModelClient, ModelReply, ModelRequest, ProviderConfig, ToolDefinition};
use crate::errors::{BrowserAgentError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Find the largest byte index <= `max_bytes` that is a valid char boundary.
fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> usize {
    if max_bytes >= s.len() {
        return s.len();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// [`ModelClient`] for OpenAI-compatible `/chat/completions` endpoints with native
/// function calling.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(config: &ProviderConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Build a client with the key read from the variable named by `api_key_env`.
    pub fn from_env(config: &ProviderConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            BrowserAgentError::ConfigurationError(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        Self::new(config, api_key)
    }

    fn build_request(&self, request: ModelRequest<'_>) -> ChatRequest {
        let tools: Vec<Value> = request.tools.iter().map(tool_schema).collect();
        let has_tools = !tools.is_empty();

        ChatRequest {
            model: self.model.clone(),
            messages: wire_messages(request.messages),
            tools,
            tool_choice: has_tools.then(|| "auto".to_string()),
            parallel_tool_calls: has_tools.then_some(false),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

fn tool_schema(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

/// Convert the history into chat-completions messages.
///
/// Tool calls whose result was compacted away are left out, since the API rejects a
/// tool call that has no matching tool message.
fn wire_messages(messages: &[Message]) -> Vec<Value> {
    let answered: HashSet<&str> = messages
        .iter()
        .filter_map(|m| match m {
            Message::ToolResult { call_id, .. } => Some(call_id.as_str()),
            _ => None,
        })
        .collect();

    messages
        .iter()
        .filter_map(|message| match message {
            Message::System { content } => Some(json!({"role": "system", "content": content})),
            Message::User { content } => Some(json!({"role": "user", "content": content})),
            Message::Assistant { content } => {
                Some(json!({"role": "assistant", "content": content}))
            }
            Message::ToolCall(call) if answered.contains(call.id.as_str()) => Some(json!({
                "role": "assistant",
                "content": Value::Null,
                "tool_calls": [{
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments.to_string(),
                    }
                }]
            })),
            Message::ToolCall(_) => None,
            Message::ToolResult {
                call_id, content, ..
            } => Some(json!({
                "role": "tool",
                "tool_call_id": call_id,
                "content": content,
            })),
        })
        .collect()
}

fn parse_reply(response: ChatResponse) -> Result<ModelReply> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| BrowserAgentError::Model("No choices in response".to_string()))?;

    let mut tool_calls = choice.message.tool_calls.unwrap_or_default().into_iter();
    if let Some(call) = tool_calls.next() {
        let dropped = tool_calls.count();
        if dropped > 0 {
            warn!(dropped, "Model returned several tool calls, keeping the first");
        }

        // Undecodable arguments are passed through as a string so the tool reports them.
        let arguments = serde_json::from_str(&call.function.arguments)
            .unwrap_or(Value::String(call.function.arguments));

        return Ok(ModelReply::ToolCall(ToolCall {
            id: call.id,
            name: call.function.name,
            arguments,
        }));
    }

    Ok(ModelReply::Assistant(
        choice.message.content.unwrap_or_default(),
    ))
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel_tool_calls: Option<bool>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request(request);

        info!(
            url = %url,
            model = %self.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Calling model"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BrowserAgentError::Model(format!("Request failed: {}", e)))?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(status = %status, body = %raw_body, "Model API error");
            return Err(BrowserAgentError::Model(format!(
                "API error {}: {}",
                status, raw_body
            )));
        }

        let end = truncate_at_char_boundary(&raw_body, 500);
        debug!(body_len = raw_body.len(), preview = %&raw_body[..end], "Model raw response");

        let chat_response: ChatResponse = serde_json::from_str(&raw_body).map_err(|e| {
            BrowserAgentError::Model(format!(
                "Failed to parse response: {}. Body: {}",
                e,
                &raw_body[..end]
            ))
        })?;

        parse_reply(chat_response)
    }
}

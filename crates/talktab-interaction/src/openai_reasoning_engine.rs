//! OpenAiReasoningEngine - Chat Completions implementation of [`ReasoningEngine`].
//!
//! Tools are advertised as OpenAI function tools; tool calls in the response
//! become [`ToolInvocation`]s and tool results are sent back as `tool` messages.

use crate::prompts::system_prompt;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use talktab_core::config::LlmConfig;
use talktab_core::conversation::ConversationMessage;
use talktab_core::reasoning::{
    ReasoningEngine, ReasoningError, ReasoningRequest, ReasoningResponse,
};
use talktab_core::tool::{ToolDefinition, ToolInvocation};

/// Reasoning engine that talks to an OpenAI-compatible HTTP API.
#[derive(Clone)]
pub struct OpenAiReasoningEngine {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAiReasoningEngine {
    /// Creates a new engine with the provided API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let defaults = LlmConfig::default();
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: defaults.base_url,
            temperature: defaults.temperature,
            max_tokens: Some(defaults.max_tokens),
        }
    }

    /// Builds an engine from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ReasoningError::ExecutionFailed`] when no API key is configured.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ReasoningError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ReasoningError::ExecutionFailed(
                    "OPENAI_API_KEY not found in config file or environment variables".into(),
                )
            })?;

        Ok(Self::new(api_key, config.model_name.clone())
            .with_base_url(config.base_url.clone())
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens))
    }

    /// Overrides the API base URL (e.g. for a compatible proxy).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, request: &ReasoningRequest<'_>) -> ChatCompletionRequest {
        let mut messages = vec![ChatMessage::text("system", system_prompt(request.accepted_schema))];
        messages.extend(request.messages.iter().map(ChatMessage::from));

        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            tools: request.tools.iter().map(FunctionTool::from).collect(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    async fn send_request(
        &self,
        body: &ChatCompletionRequest,
    ) -> Result<ReasoningResponse, ReasoningError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|err| ReasoningError::ProcessError {
                status_code: None,
                message: format!("OpenAI API request failed: {err}"),
                is_retryable: err.is_connect() || err.is_timeout(),
                retry_after: None,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read OpenAI error body".to_string());
            return Err(map_http_error(status, body_text, retry_after));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|err| {
            ReasoningError::InvalidResponse(format!("Failed to parse OpenAI response: {err}"))
        })?;

        extract_response(parsed)
    }
}

#[async_trait]
impl ReasoningEngine for OpenAiReasoningEngine {
    async fn respond(
        &self,
        request: ReasoningRequest<'_>,
    ) -> Result<ReasoningResponse, ReasoningError> {
        let body = self.build_request(&request);
        tracing::debug!(
            model = %self.model,
            messages = body.messages.len(),
            "Sending chat completion request"
        );
        self.send_request(&body).await
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<FunctionTool>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize, Debug, PartialEq)]
struct ChatMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &'static str, content: String) -> Self {
        Self {
            role,
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

impl From<&ConversationMessage> for ChatMessage {
    fn from(message: &ConversationMessage) -> Self {
        match message {
            ConversationMessage::User { content, .. } => Self::text("user", content.clone()),
            ConversationMessage::Assistant {
                content,
                tool_invocations,
                ..
            } => Self {
                role: "assistant",
                // The API rejects an empty string next to tool calls.
                content: if content.is_empty() && !tool_invocations.is_empty() {
                    None
                } else {
                    Some(content.clone())
                },
                tool_calls: tool_invocations.iter().map(WireToolCall::from).collect(),
                tool_call_id: None,
            },
            ConversationMessage::Tool { result, .. } => Self {
                role: "tool",
                content: Some(result.content.clone()),
                tool_calls: Vec::new(),
                tool_call_id: Some(result.invocation_id.clone()),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded arguments, as a string.
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

impl From<&ToolInvocation> for WireToolCall {
    fn from(invocation: &ToolInvocation) -> Self {
        let arguments = if invocation.arguments.is_null() {
            "{}".to_string()
        } else {
            invocation.arguments.to_string()
        };
        Self {
            id: invocation.id.clone(),
            kind: function_type(),
            function: WireFunctionCall {
                name: invocation.name.clone(),
                arguments,
            },
        }
    }
}

impl From<WireToolCall> for ToolInvocation {
    fn from(call: WireToolCall) -> Self {
        let raw = call.function.arguments;
        // Unparseable arguments are passed through as a string; the tool
        // catalogue reports them as invalid input.
        let arguments = if raw.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&raw).unwrap_or(Value::String(raw))
        };
        ToolInvocation::new(call.id, call.function.name, arguments)
    }
}

#[derive(Serialize)]
struct FunctionTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionSpec,
}

#[derive(Serialize)]
struct FunctionSpec {
    name: String,
    description: String,
    parameters: Value,
}

impl From<&ToolDefinition> for FunctionTool {
    fn from(definition: &ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: FunctionSpec {
                name: definition.name.clone(),
                description: definition.description.clone(),
                parameters: definition.parameters.clone(),
            },
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_response(response: ChatCompletionResponse) -> Result<ReasoningResponse, ReasoningError> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| {
            ReasoningError::InvalidResponse("OpenAI API returned no choices".into())
        })?;

    let tool_invocations: Vec<ToolInvocation> = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(ToolInvocation::from)
        .collect();
    let content = message.content.unwrap_or_default();

    if content.trim().is_empty() && tool_invocations.is_empty() {
        return Err(ReasoningError::InvalidResponse(
            "OpenAI API returned neither content nor tool calls".into(),
        ));
    }

    Ok(ReasoningResponse {
        content,
        tool_invocations,
    })
}

fn map_http_error(status: StatusCode, body: String, retry_after: Option<Duration>) -> ReasoningError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.clone());

    let is_retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    ReasoningError::ProcessError {
        status_code: Some(status.as_u16()),
        message,
        is_retryable,
        retry_after,
    }
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    // HTTP-date values are ignored.
    value.parse::<u64>().ok().map(Duration::from_secs)
}

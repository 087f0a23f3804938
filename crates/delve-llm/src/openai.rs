//! OpenAI-compatible chat-completions model
//!
//! Works against any endpoint that speaks the `/v1/chat/completions` wire
//! format (OpenAI, OpenRouter, local gateways). Provider errors are mapped
//! onto [`LlmError`], with length-limit detection driven by the provider
//! pattern table.

use crate::client::{ChatModel, ChatRequest, ChatResponse, ToolSpec};
use crate::error::{LlmError, LlmResult};
use crate::message::{Message, Role, ToolCall};
use crate::provider::{bare_model_name, is_length_error, resolve_api_key};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Default OpenAI endpoint
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenRouter endpoint
pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Chat model backed by an OpenAI-compatible HTTP endpoint
#[derive(Debug, Clone)]
pub struct OpenAiCompatModel {
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiCompatModel {
    /// Create model for `endpoint` with a request timeout
    ///
    /// # Errors
    /// Returns [`LlmError::Other`] if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Model pointed at the public OpenAI endpoint
    ///
    /// # Errors
    /// See [`OpenAiCompatModel::new`].
    pub fn openai(timeout: Duration) -> LlmResult<Self> {
        Self::new(OPENAI_API_URL, timeout)
    }

    /// Endpoint URL
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_body(request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_to_wire).collect();
        let mut body = json!({
            "model": bare_model_name(&request.settings.model),
            "max_tokens": request.settings.max_tokens,
            "messages": messages,
        });

        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.iter().map(tool_to_wire).collect());
        }

        if let Some(schema) = &request.response_schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "structured_output",
                    "schema": schema,
                },
            });
        }

        body
    }
}

fn message_to_wire(message: &Message) -> Value {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    let mut wire = json!({ "role": role, "content": message.content });

    if !message.tool_calls.is_empty() {
        let calls: Vec<Value> = message
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.args.to_string(),
                    },
                })
            })
            .collect();
        wire["tool_calls"] = Value::Array(calls);
    }

    if let Some(id) = &message.tool_call_id {
        wire["tool_call_id"] = json!(id);
    }

    wire
}

fn tool_to_wire(tool: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        },
    })
}

/// Map a non-success HTTP response onto [`LlmError`]
///
/// 429 is always a rate limit, even when the body matches a length pattern
/// (Gemini reports quota exhaustion as `RESOURCE_EXHAUSTED`).
#[must_use]
pub fn parse_http_error(status: u16, body: &str, model: &str) -> LlmError {
    if status == 429 {
        return LlmError::RateLimited(body.to_string());
    }
    if is_length_error(model, body) {
        return LlmError::ContextLengthExceeded(body.to_string());
    }
    match status {
        401 => LlmError::Authentication(format!("{model}: invalid API key")),
        403 => LlmError::Authentication(format!("{model}: access denied")),
        _ => LlmError::Api {
            status,
            body: body.to_string(),
        },
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
    #[serde(default)]
    annotations: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn parse_response(body: &str) -> LlmResult<ChatResponse> {
    let wire: WireResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::Decode(format!("failed to parse response: {e}")))?;
    let Some(choice) = wire.choices.into_iter().next() else {
        return Err(LlmError::Decode("response has no choices".into()));
    };

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|tc| {
            let args = serde_json::from_str(&tc.function.arguments).unwrap_or(Value::Null);
            ToolCall::new(tc.id, tc.function.name, args)
        })
        .collect();

    Ok(ChatResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        native_search: choice
            .message
            .annotations
            .iter()
            .any(|a| a.get("type").and_then(Value::as_str) == Some("url_citation")),
    })
}

#[async_trait]
impl ChatModel for OpenAiCompatModel {
    fn provider(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(&self, request: ChatRequest) -> LlmResult<ChatResponse> {
        let model = request.settings.model.clone();
        let api_key = resolve_api_key(&model, request.settings.api_key.as_deref())
            .ok_or_else(|| LlmError::MissingApiKey(model.clone()))?;

        let body = Self::build_body(&request);
        tracing::debug!(
            model = %model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending chat completion"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(parse_http_error(status, &text, &model));
        }

        parse_response(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ModelSettings;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            parse_http_error(401, "nope", "openai:gpt-4.1"),
            LlmError::Authentication(_)
        ));
        assert!(matches!(
            parse_http_error(429, "slow down", "openai:gpt-4.1"),
            LlmError::RateLimited(_)
        ));
        assert!(matches!(
            parse_http_error(503, "overloaded", "openai:gpt-4.1"),
            LlmError::Api { status: 503, .. }
        ));
    }

    #[test]
    fn quota_exhaustion_is_rate_limited() {
        let body = r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED","message":"quota"}}"#;
        let err = parse_http_error(429, body, "google:gemini-2.5-pro");
        assert!(matches!(err, LlmError::RateLimited(_)));
        assert!(err.is_retryable());
        assert!(!err.is_length_limit());
    }

    #[test]
    fn length_error_detected_in_400_body() {
        let body = r#"{"error":{"code":"context_length_exceeded","message":"too long"}}"#;
        assert!(parse_http_error(400, body, "openai:gpt-4.1").is_length_limit());
    }

    #[test]
    fn body_carries_tools_and_strips_prefix() {
        let request = ChatRequest::new(
            vec![Message::system("sys"), Message::user("hi")],
            ModelSettings::new("openai:gpt-4.1", 512),
        )
        .with_tools(vec![ToolSpec::new(
            "think_tool",
            "reflect",
            json!({"type": "object"}),
        )]);

        let body = OpenAiCompatModel::build_body(&request);
        assert_eq!(body["model"], "gpt-4.1");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["tools"][0]["function"]["name"], "think_tool");
    }

    #[test]
    fn tool_messages_keep_call_ids() {
        let call = ToolCall::new("call_1", "search", json!({"q": "x"}));
        let wire = message_to_wire(&Message::assistant_with_calls("", vec![call.clone()]));
        assert_eq!(wire["tool_calls"][0]["function"]["arguments"], r#"{"q":"x"}"#);

        let wire = message_to_wire(&Message::tool_result(&call, "done"));
        assert_eq!(wire["tool_call_id"], "call_1");
    }

    #[test]
    fn parses_tool_calls() {
        let body = r#"{"choices":[{"message":{"content":null,"tool_calls":[
            {"id":"c1","type":"function","function":{"name":"ConductResearch","arguments":"{\"research_topic\":\"rust\"}"}}
        ]}}]}"#;
        let reply = parse_response(body).unwrap();
        assert_eq!(reply.content, "");
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].str_arg("research_topic"), Some("rust"));
        assert!(!reply.native_search);
    }

    #[test]
    fn empty_choices_is_decode_error() {
        assert!(matches!(
            parse_response(r#"{"choices":[]}"#),
            Err(LlmError::Decode(_))
        ));
    }
}

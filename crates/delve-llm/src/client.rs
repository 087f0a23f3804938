//! Model trait and retrying client
//!
//! [`ChatModel`] is the raw provider boundary. [`LlmClient`] wraps one model
//! with the pipeline-wide retry policy and the typed structured-output decode
//! step. The client is built once at process start and passed by reference
//! into every stage.

use crate::error::{LlmError, LlmResult};
use crate::message::{Message, ToolCall};
use crate::text::strip_code_fence;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Per-call model settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// `provider:model` identifier
    pub model: String,
    /// Output token cap
    pub max_tokens: u32,
    /// Explicit API key (falls back to the provider env var)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl ModelSettings {
    /// Create settings for a model
    #[inline]
    #[must_use]
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            api_key: None,
        }
    }

    /// With explicit API key
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// Tool definition bound to a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name
    pub name: String,
    /// What the tool does
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    /// Create tool spec
    #[inline]
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// One model invocation
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Messages in order
    pub messages: Vec<Message>,
    /// Model settings
    pub settings: ModelSettings,
    /// Tools the model may call
    pub tools: Vec<ToolSpec>,
    /// JSON schema the reply must conform to
    pub response_schema: Option<serde_json::Value>,
}

impl ChatRequest {
    /// Create a plain text request
    #[inline]
    #[must_use]
    pub fn new(messages: Vec<Message>, settings: ModelSettings) -> Self {
        Self {
            messages,
            settings,
            tools: Vec::new(),
            response_schema: None,
        }
    }

    /// Bind tools
    #[inline]
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    /// Require a structured reply
    #[inline]
    #[must_use]
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// Model reply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    /// Text content
    pub content: String,
    /// Requested tool calls
    pub tool_calls: Vec<ToolCall>,
    /// Whether the provider ran a search on its side
    pub native_search: bool,
}

impl ChatResponse {
    /// Text-only reply
    #[inline]
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Reply requesting tool calls
    #[inline]
    #[must_use]
    pub fn with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            native_search: false,
        }
    }

    /// Convert into the assistant message appended to a thread
    #[must_use]
    pub fn to_message(&self) -> Message {
        Message::assistant_with_calls(self.content.clone(), self.tool_calls.clone())
    }
}

/// Raw provider boundary
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider name for logs
    fn provider(&self) -> &str;

    /// Perform a single call (no retries)
    async fn complete(&self, request: ChatRequest) -> LlmResult<ChatResponse>;
}

/// Retry policy applied by [`LlmClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (at least 1)
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Create retry policy
    #[inline]
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Retry without waiting between attempts
    #[inline]
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    fn delay_for(&self, retry: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Shared, immutable LLM client
#[derive(Clone)]
pub struct LlmClient {
    model: Arc<dyn ChatModel>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.model.provider())
            .field("retry", &self.retry)
            .finish()
    }
}

impl LlmClient {
    /// Create client with the default retry policy
    #[inline]
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            retry: RetryPolicy::default(),
        }
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Retry policy in effect
    #[inline]
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Invoke the model, retrying transient failures
    ///
    /// # Errors
    /// - the first non-retryable error (length limit, authentication)
    /// - the last error once attempts are exhausted
    pub async fn invoke(&self, request: ChatRequest) -> LlmResult<ChatResponse> {
        self.with_retries(&request, Ok).await
    }

    /// Invoke the model and decode a typed reply
    ///
    /// The JSON schema of `T` is attached to the request. Decode failures are
    /// retried like any other transient error.
    ///
    /// # Errors
    /// Same as [`LlmClient::invoke`], plus [`LlmError::Decode`].
    pub async fn invoke_structured<T>(
        &self,
        messages: Vec<Message>,
        settings: ModelSettings,
    ) -> LlmResult<T>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let schema = serde_json::to_value(schemars::schema_for!(T))
            .map_err(|e| LlmError::Other(format!("schema generation failed: {e}")))?;
        let request = ChatRequest::new(messages, settings).with_schema(schema);

        self.with_retries(&request, |response| {
            decode_structured::<T>(&response.content)
        })
        .await
    }

    async fn with_retries<T, F>(&self, request: &ChatRequest, decode: F) -> LlmResult<T>
    where
        F: Fn(ChatResponse) -> LlmResult<T>,
    {
        let model = request.settings.model.as_str();
        let mut attempt = 1;
        loop {
            let result = self.model.complete(request.clone()).await.and_then(&decode);
            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    tracing::warn!(
                        model,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %err,
                        "LLM call failed, retrying"
                    );
                    let delay = self.retry.delay_for(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => {
                    tracing::debug!(model, attempt, error = %err, "LLM call failed");
                    return Err(err);
                }
            }
        }
    }
}

/// Decode a structured reply, tolerating a surrounding code fence
///
/// # Errors
/// [`LlmError::Decode`] when the content is not valid JSON for `T`.
pub fn decode_structured<T: DeserializeOwned>(content: &str) -> LlmResult<T> {
    serde_json::from_str(&strip_code_fence(content)).map_err(|e| LlmError::Decode(e.to_string()))
}

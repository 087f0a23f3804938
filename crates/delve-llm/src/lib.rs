//! LLM-call adapter for the delve research pipeline
//!
//! - [`Thread`]: ordered role-tagged message sequence
//! - [`LlmClient`]: retrying client with typed structured output
//! - [`ChatModel`]: provider boundary ([`OpenAiCompatModel`] over HTTP)
//! - provider tables: length-error patterns, context sizes, API-key lookup

pub mod client;
pub mod error;
pub mod message;
pub mod openai;
pub mod provider;
pub mod text;

pub use client::{
    decode_structured, ChatModel, ChatRequest, ChatResponse, LlmClient, ModelSettings,
    RetryPolicy, ToolSpec,
};
pub use error::{LlmError, LlmResult};
pub use message::{Message, Role, Thread, ToolCall};
pub use openai::{OpenAiCompatModel, OPENAI_API_URL, OPENROUTER_API_URL};
pub use provider::{is_length_error, model_token_limit, resolve_api_key, Provider};
pub use text::{strip_code_fence, today_string, truncate_chars};

//! Testing utilities for Delve workspace
//!
//! Scripted models, tools, stores and executors plus call fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use delve_core::{ArtifactStore, ResearchConfig, StoreError, Tool, ToolError};
use delve_heal::{CodeExecutor, ExecutionOutcome};
use delve_llm::{
    ChatModel, ChatRequest, ChatResponse, LlmClient, LlmError, LlmResult, RetryPolicy, ToolCall,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Which pipeline stage issued a request, judged from its first message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Clarify,
    Brief,
    Supervisor,
    Researcher,
    Compression,
    FinalReport,
    Other,
}

impl RequestKind {
    pub fn of(request: &ChatRequest) -> Self {
        let first = request
            .messages
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        if first.starts_with("You are a research supervisor") {
            Self::Supervisor
        } else if first.contains("You are a research assistant") {
            Self::Researcher
        } else if first.starts_with("You clean up research findings") {
            Self::Compression
        } else if first.contains("<Research Brief>") {
            Self::FinalReport
        } else if first.contains("clarifying question") {
            Self::Clarify
        } else if first.contains("research brief") {
            Self::Brief
        } else {
            Self::Other
        }
    }
}

/// Model replaying a fixed queue of results, then an optional fallback
#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<LlmResult<ChatResponse>>>,
    fallback: Option<ChatResponse>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(script: impl IntoIterator<Item = LlmResult<ChatResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn replies(replies: impl IntoIterator<Item = ChatResponse>) -> Self {
        Self::new(replies.into_iter().map(Ok))
    }

    pub fn with_fallback(mut self, response: ChatResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn provider(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ChatRequest) -> LlmResult<ChatResponse> {
        self.requests.lock().push(request);
        let next = self.script.lock().pop_front();
        match next {
            Some(result) => result,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| LlmError::Other("script exhausted".into())),
        }
    }
}

type Route = dyn Fn(RequestKind, &ChatRequest) -> LlmResult<ChatResponse> + Send + Sync;

/// Model answering each request through a closure keyed on the request kind
pub struct FnModel {
    route: Box<Route>,
    requests: Mutex<Vec<(RequestKind, ChatRequest)>>,
}

impl FnModel {
    pub fn new<F>(route: F) -> Self
    where
        F: Fn(RequestKind, &ChatRequest) -> LlmResult<ChatResponse> + Send + Sync + 'static,
    {
        Self {
            route: Box::new(route),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self, kind: RequestKind) -> usize {
        self.requests.lock().iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn requests_of(&self, kind: RequestKind) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

#[async_trait]
impl ChatModel for FnModel {
    fn provider(&self) -> &str {
        "fn"
    }

    async fn complete(&self, request: ChatRequest) -> LlmResult<ChatResponse> {
        let kind = RequestKind::of(&request);
        let result = (self.route)(kind, &request);
        self.requests.lock().push((kind, request));
        result
    }
}

/// Client over `model` with immediate retries
pub fn client<M: ChatModel + 'static>(model: Arc<M>) -> LlmClient {
    LlmClient::new(model).with_retry(RetryPolicy::immediate(3))
}

/// Config with clarification off and small caps
pub fn quick_config() -> ResearchConfig {
    ResearchConfig::default()
        .with_clarification(false)
        .with_max_concurrent_units(2)
        .with_max_iterations(3)
        .with_max_tool_calls(3)
}

pub fn conduct_research_call(id: &str, topic: &str) -> ToolCall {
    ToolCall::new(id, "ConductResearch", json!({ "research_topic": topic }))
}

pub fn think_call(id: &str, reflection: &str) -> ToolCall {
    ToolCall::new(id, "think_tool", json!({ "reflection": reflection }))
}

pub fn complete_call(id: &str) -> ToolCall {
    ToolCall::new(id, "ResearchComplete", json!({}))
}

pub fn tool_call(id: &str, name: &str, args: Value) -> ToolCall {
    ToolCall::new(id, name, args)
}

pub fn clarify_reply(need: bool, question: &str, verification: &str) -> ChatResponse {
    ChatResponse::text(
        json!({
            "need_clarification": need,
            "question": question,
            "verification": verification,
        })
        .to_string(),
    )
}

pub fn brief_reply(brief: &str) -> ChatResponse {
    ChatResponse::text(json!({ "research_brief": brief }).to_string())
}

pub fn length_error() -> LlmError {
    LlmError::ContextLengthExceeded("maximum context length exceeded".into())
}

/// Tool returning a fixed string
#[derive(Debug, Clone)]
pub struct StaticTool {
    name: String,
    output: String,
}

impl StaticTool {
    pub fn new(name: &str, output: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            output: output.to_string(),
        })
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Returns canned output"
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn invoke(&self, _args: Value) -> Result<String, ToolError> {
        Ok(self.output.clone())
    }
}

/// Tool that always errors
#[derive(Debug, Clone)]
pub struct FailingTool {
    name: String,
}

impl FailingTool {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn invoke(&self, _args: Value) -> Result<String, ToolError> {
        Err(ToolError::Failed("upstream unavailable".into()))
    }
}

/// Tool that panics
#[derive(Debug, Clone)]
pub struct PanickingTool {
    name: String,
}

impl PanickingTool {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Panics"
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn invoke(&self, _args: Value) -> Result<String, ToolError> {
        panic!("tool exploded")
    }
}

/// In-memory artifact store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn write(&self, key: &str, text: &str) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), text.to_string());
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get(key))
    }
}

/// One recorded executor call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedRun {
    pub code: String,
    pub target: PathBuf,
    pub test_command: Option<String>,
}

/// Executor replaying outcomes; the last one repeats once the queue drains
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    outcomes: Mutex<VecDeque<ExecutionOutcome>>,
    runs: Mutex<Vec<ExecutedRun>>,
}

impl ScriptedExecutor {
    pub fn new(outcomes: impl IntoIterator<Item = ExecutionOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn runs(&self) -> Vec<ExecutedRun> {
        self.runs.lock().clone()
    }
}

#[async_trait]
impl CodeExecutor for ScriptedExecutor {
    async fn run(
        &self,
        code: &str,
        target: &Path,
        test_command: Option<&str>,
        _timeout: Duration,
    ) -> ExecutionOutcome {
        self.runs.lock().push(ExecutedRun {
            code: code.to_string(),
            target: target.to_path_buf(),
            test_command: test_command.map(str::to_string),
        });
        let mut outcomes = self.outcomes.lock();
        if outcomes.len() > 1 {
            outcomes.pop_front().unwrap_or_else(|| ExecutionOutcome::passed(""))
        } else {
            outcomes
                .front()
                .cloned()
                .unwrap_or_else(|| ExecutionOutcome::passed(""))
        }
    }
}

//! Tool registry
//!
//! Tools are looked up by name at call time. Every invocation goes through
//! [`ToolRegistry::execute`], which turns errors, panics, and unknown names
//! into text so that one failing call never aborts its siblings.

use crate::error::ToolError;
use crate::types::{RESEARCH_COMPLETE, THINK_TOOL};
use async_trait::async_trait;
use delve_llm::{ToolCall, ToolSpec};
use futures::future::join_all;
use futures::FutureExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Capability callable by a model
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model calls
    fn name(&self) -> &str;

    /// What the tool does
    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn parameters(&self) -> Value;

    /// Run the tool
    async fn invoke(&self, args: Value) -> Result<String, ToolError>;

    /// Definition bound to model calls
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description(), self.parameters())
    }
}

/// Reflection tool: echoes the reflection back as an acknowledgement
#[derive(Debug, Clone, Copy, Default)]
pub struct ThinkTool;

/// Acknowledgement text for a reflection
#[must_use]
pub fn reflection_recorded(reflection: &str) -> String {
    format!("Reflection recorded: {reflection}")
}

#[async_trait]
impl Tool for ThinkTool {
    fn name(&self) -> &str {
        THINK_TOOL
    }

    fn description(&self) -> &str {
        "Record a strategic reflection on progress, gaps, and next steps."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "reflection": {"type": "string", "description": "Your reflection"}
            },
            "required": ["reflection"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let reflection = args
            .get("reflection")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("missing `reflection`".into()))?;
        Ok(reflection_recorded(reflection))
    }
}

/// Completion signal tool
#[derive(Debug, Clone, Copy, Default)]
pub struct ResearchCompleteTool;

#[async_trait]
impl Tool for ResearchCompleteTool {
    fn name(&self) -> &str {
        RESEARCH_COMPLETE
    }

    fn description(&self) -> &str {
        "Call this to indicate that the research is complete."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn invoke(&self, _args: Value) -> Result<String, ToolError> {
        Ok("Research marked complete".to_string())
    }
}

/// Run a tool, turning any failure into an observation
pub async fn execute_safely(tool: &dyn Tool, args: Value) -> String {
    match AssertUnwindSafe(tool.invoke(args)).catch_unwind().await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            tracing::warn!(tool = tool.name(), error = %err, "tool failed");
            format!("Error executing tool: {err}")
        }
        Err(_) => {
            tracing::error!(tool = tool.name(), "tool panicked");
            "Error executing tool: tool panicked".to_string()
        }
    }
}

/// Name-keyed tool registry
#[derive(Clone, Default)]
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

impl ToolRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Builder form of [`ToolRegistry::register`]
    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Look up a tool by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Number of registered tools
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no tools are registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Tool names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Definitions in registration order
    #[must_use]
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.spec())
            .collect()
    }

    /// Configured tools plus the built-in reflection and completion tools
    #[must_use]
    pub fn worker_toolset(&self) -> Self {
        self.clone()
            .with_tool(Arc::new(ThinkTool))
            .with_tool(Arc::new(ResearchCompleteTool))
    }

    /// Execute one call
    pub async fn execute(&self, call: &ToolCall) -> String {
        match self.get(&call.name) {
            Some(tool) => execute_safely(tool.as_ref(), call.args.clone()).await,
            None => {
                tracing::warn!(tool = %call.name, "unknown tool requested");
                format!("Error: tool '{}' not found", call.name)
            }
        }
    }

    /// Execute calls concurrently; `result[i]` answers `calls[i]`
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<String> {
        join_all(calls.iter().map(|call| self.execute(call))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echo"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn invoke(&self, args: Value) -> Result<String, ToolError> {
            Ok(args.to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl Tool for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn invoke(&self, _args: Value) -> Result<String, ToolError> {
            Err(ToolError::Failed("backend down".into()))
        }
    }

    struct Panics;

    #[async_trait]
    impl Tool for Panics {
        fn name(&self) -> &str {
            "panics"
        }
        fn description(&self) -> &str {
            "panics"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn invoke(&self, _args: Value) -> Result<String, ToolError> {
            panic!("bug in tool")
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .with_tool(Arc::new(Echo))
            .with_tool(Arc::new(Broken))
            .with_tool(Arc::new(Panics))
    }

    #[tokio::test]
    async fn failures_become_observations() {
        let calls = vec![
            ToolCall::new("1", "echo", json!({"x": 1})),
            ToolCall::new("2", "broken", json!({})),
            ToolCall::new("3", "panics", json!({})),
            ToolCall::new("4", "missing", json!({})),
        ];
        let results = registry().execute_all(&calls).await;

        assert_eq!(results[0], r#"{"x":1}"#);
        assert_eq!(results[1], "Error executing tool: backend down");
        assert_eq!(results[2], "Error executing tool: tool panicked");
        assert_eq!(results[3], "Error: tool 'missing' not found");
    }

    #[tokio::test]
    async fn think_tool_acknowledges() {
        let out = execute_safely(&ThinkTool, json!({"reflection": "need sources"})).await;
        assert_eq!(out, "Reflection recorded: need sources");
    }

    #[test]
    fn worker_toolset_adds_builtins_once() {
        let configured = ToolRegistry::new().with_tool(Arc::new(Echo));
        let toolset = configured.worker_toolset().worker_toolset();
        assert_eq!(toolset.names(), vec!["echo", THINK_TOOL, RESEARCH_COMPLETE]);
        assert_eq!(configured.len(), 1);
    }

    /// `catch_unwind` only sees panics when every profile unwinds.
    #[test]
    fn profiles_keep_unwinding() {
        let manifest: toml::Value =
            toml::from_str(include_str!("../../../Cargo.toml")).unwrap();
        let profiles = manifest["profile"].as_table().unwrap();
        for (name, profile) in profiles {
            assert_ne!(
                profile.get("panic").and_then(toml::Value::as_str),
                Some("abort"),
                "profile {name} aborts on panic"
            );
        }
    }
}

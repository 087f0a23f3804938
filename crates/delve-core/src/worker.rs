//! Research worker
//!
//! Bounded act/observe loop over one delegation, followed by compression.
//! Stops when the model requests no tools (and did no native search), when
//! it calls `ResearchComplete`, or when the tool-call cap is reached.
//!
//! A model failure mid-loop ends acting early. Whatever the thread gathered
//! is still compressed; with nothing gathered the result carries an error
//! string instead. Only a worker without tools fails outward.

use crate::compressor::compress;
use crate::config::ResearchConfig;
use crate::dispatcher::TaskRunner;
use crate::error::PipelineError;
use crate::prompts;
use crate::state::ResearcherState;
use crate::store::{persist, researcher_key, ArtifactStore};
use crate::tools::ToolRegistry;
use crate::types::{TaskDelegation, WorkerResult, RESEARCH_COMPLETE};
use async_trait::async_trait;
use delve_llm::{today_string, ChatRequest, LlmClient, LlmError, Message};

/// Compressed text for a worker whose first model call failed
#[must_use]
pub fn research_failed(err: &LlmError) -> String {
    format!("Error conducting research: {err}")
}

/// Research worker bound to a client, config, and configured tools
pub struct Researcher<'a> {
    llm: &'a LlmClient,
    config: &'a ResearchConfig,
    tools: &'a ToolRegistry,
    store: &'a dyn ArtifactStore,
}

impl std::fmt::Debug for Researcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Researcher")
            .field("tools", self.tools)
            .finish_non_exhaustive()
    }
}

impl<'a> Researcher<'a> {
    /// Create worker
    #[inline]
    #[must_use]
    pub fn new(
        llm: &'a LlmClient,
        config: &'a ResearchConfig,
        tools: &'a ToolRegistry,
        store: &'a dyn ArtifactStore,
    ) -> Self {
        Self {
            llm,
            config,
            tools,
            store,
        }
    }

    /// Run the act/observe loop for `task`, then compress
    ///
    /// # Errors
    /// `PipelineError::NoTools` if no tools are configured.
    pub async fn research(&self, task: &TaskDelegation) -> Result<WorkerResult, PipelineError> {
        if self.tools.is_empty() {
            return Err(PipelineError::NoTools);
        }

        let toolset = self.tools.worker_toolset();
        let specs = toolset.specs();
        let system = Message::system(prompts::researcher(
            self.config.mcp_prompt.as_deref().unwrap_or_default(),
            &today_string(),
        ));
        let settings = self.config.research_model.settings();
        let mut state = ResearcherState::new(&task.topic);
        let mut failure = None;

        tracing::info!(task = %task.id, topic = %task.topic, "researcher started");

        loop {
            let mut messages = Vec::with_capacity(state.thread.len() + 1);
            messages.push(system.clone());
            messages.extend(state.thread.messages().iter().cloned());

            let request = ChatRequest::new(messages, settings.clone()).with_tools(specs.clone());
            let response = match self.llm.invoke(request).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(task = %task.id, error = %err, "researcher model call failed");
                    failure = Some(err);
                    break;
                }
            };
            state.thread.push(response.to_message());
            state.tool_call_iterations += 1;

            if response.tool_calls.is_empty() && !response.native_search {
                tracing::debug!(task = %task.id, "no tool calls, finishing");
                break;
            }

            let observations = toolset.execute_all(&response.tool_calls).await;
            state.thread.extend(
                response
                    .tool_calls
                    .iter()
                    .zip(observations)
                    .map(|(call, text)| Message::tool_result(call, text)),
            );

            let completed = response
                .tool_calls
                .iter()
                .any(|call| call.name == RESEARCH_COMPLETE);
            if completed || state.tool_call_iterations >= self.config.max_react_tool_calls {
                tracing::debug!(
                    task = %task.id,
                    iterations = state.tool_call_iterations,
                    completed,
                    "researcher loop finished"
                );
                break;
            }
        }

        let result = match failure {
            Some(err) if state.thread.tool_and_assistant_text().is_empty() => WorkerResult {
                compressed: research_failed(&err),
                raw_notes: String::new(),
            },
            _ => {
                compress(
                    self.llm,
                    &self.config.compression_model.settings(),
                    state.thread,
                )
                .await
            }
        };

        let agent = task.id.to_string();
        persist(
            self.store,
            &researcher_key(&agent, "compressed.md"),
            &result.compressed,
        )
        .await;
        persist(
            self.store,
            &researcher_key(&agent, "raw_notes.md"),
            &result.raw_notes,
        )
        .await;

        tracing::info!(
            task = %task.id,
            compressed_chars = result.compressed.len(),
            raw_chars = result.raw_notes.len(),
            "researcher finished"
        );
        Ok(result)
    }
}

#[async_trait]
impl TaskRunner for Researcher<'_> {
    async fn run(&self, task: &TaskDelegation) -> Result<WorkerResult, PipelineError> {
        self.research(task).await
    }
}

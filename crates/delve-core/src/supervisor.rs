//! Supervisor loop
//!
//! Alternates between planning (one model call with the supervisor tools)
//! and executing the requested actions. Exit is checked before any action
//! runs:
//! - iteration counter above the configured maximum
//! - no tool calls in the last plan
//! - an explicit `ResearchComplete`
//!
//! A failed plan or a failed dispatch round also ends the loop; notes gathered
//! so far are kept either way.

use crate::config::ResearchConfig;
use crate::dispatcher::{AdmissionPolicy, Dispatcher, PrefixAdmission, TaskRunner};
use crate::state::SupervisorState;
use crate::telemetry;
use crate::tools::{reflection_recorded, ResearchCompleteTool, ThinkTool, Tool};
use crate::types::{SupervisorAction, TaskDelegation, CONDUCT_RESEARCH, THINK_TOOL};
use delve_llm::{ChatRequest, LlmClient, Message, Thread, ToolCall, ToolSpec};
use serde_json::json;

/// Why the supervisor loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorExit {
    /// Iteration counter exceeded the maximum
    IterationLimit,
    /// Last plan requested no tools
    NoToolCalls,
    /// Last plan called `ResearchComplete`
    ResearchComplete,
    /// Planning call failed after retries
    PlanningFailed(String),
    /// A dispatch round failed
    DispatchFailed(String),
}

impl SupervisorExit {
    /// Check if the loop ended on an error
    #[inline]
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::PlanningFailed(_) | Self::DispatchFailed(_))
    }
}

/// Finished supervisor loop
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisionOutcome {
    /// Final loop state
    pub state: SupervisorState,
    /// Every tool-result text in the supervisor thread, in order
    pub notes: Vec<String>,
    /// Exit reason
    pub exit: SupervisorExit,
}

impl SupervisionOutcome {
    /// Combined length of the notes
    #[must_use]
    pub fn notes_length(&self) -> usize {
        self.notes.iter().map(String::len).sum()
    }

    /// Combined length of the raw notes
    #[must_use]
    pub fn raw_notes_length(&self) -> usize {
        self.state.raw_notes.iter().map(String::len).sum()
    }
}

/// Tool definitions offered to the supervisor
#[must_use]
pub fn supervisor_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            CONDUCT_RESEARCH,
            "Delegate a research topic to a dedicated research worker.",
            json!({
                "type": "object",
                "properties": {
                    "research_topic": {
                        "type": "string",
                        "description": "Standalone topic to research, described in detail"
                    }
                },
                "required": ["research_topic"]
            }),
        ),
        ResearchCompleteTool.spec(),
        ThinkTool.spec(),
    ]
}

/// Supervisor loop bound to a client and config
pub struct Supervisor<'a> {
    llm: &'a LlmClient,
    config: &'a ResearchConfig,
    runner: &'a dyn TaskRunner,
    policy: &'a dyn AdmissionPolicy,
}

impl std::fmt::Debug for Supervisor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("max_iterations", &self.config.max_researcher_iterations)
            .finish_non_exhaustive()
    }
}

impl<'a> Supervisor<'a> {
    /// Create supervisor running delegations through `runner`
    #[inline]
    #[must_use]
    pub fn new(
        llm: &'a LlmClient,
        config: &'a ResearchConfig,
        runner: &'a dyn TaskRunner,
    ) -> Self {
        Self {
            llm,
            config,
            runner,
            policy: &PrefixAdmission,
        }
    }

    /// With a different admission policy
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: &'a dyn AdmissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run the loop over a seeded supervisor thread
    pub async fn supervise(&self, thread: Thread) -> SupervisionOutcome {
        let mut state = SupervisorState::new(thread);
        let dispatcher = Dispatcher::new(self.runner, self.config.max_concurrent_research_units)
            .with_policy(self.policy);
        let settings = self.config.research_model.settings();
        let tools = supervisor_tools();
        let max_iterations = self.config.max_researcher_iterations;

        let exit = loop {
            // PLANNING
            let request = ChatRequest::new(state.thread.messages().to_vec(), settings.clone())
                .with_tools(tools.clone());
            let response = match self.llm.invoke(request).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        iterations = state.iterations,
                        "supervisor planning failed"
                    );
                    break SupervisorExit::PlanningFailed(err.to_string());
                }
            };
            state.thread.push(response.to_message());
            state.iterations += 1;

            // EXECUTING_TOOLS
            let actions: Vec<SupervisorAction> = response
                .tool_calls
                .iter()
                .map(SupervisorAction::from_call)
                .collect();

            if state.exceeded(max_iterations) {
                break SupervisorExit::IterationLimit;
            }
            if actions.is_empty() {
                break SupervisorExit::NoToolCalls;
            }
            if actions.contains(&SupervisorAction::ResearchComplete) {
                break SupervisorExit::ResearchComplete;
            }

            if let Err(reason) = self.execute_actions(&dispatcher, &mut state, actions).await {
                break SupervisorExit::DispatchFailed(reason);
            }
        };

        let notes = state.thread.tool_results();
        telemetry::record_supervision(state.iterations);
        let outcome = SupervisionOutcome { state, notes, exit };
        tracing::info!(
            iterations = outcome.state.iterations,
            exit = ?outcome.exit,
            notes = outcome.notes.len(),
            notes_chars = outcome.notes_length(),
            raw_notes_chars = outcome.raw_notes_length(),
            "supervisor finished"
        );
        outcome
    }

    async fn execute_actions(
        &self,
        dispatcher: &Dispatcher<'_>,
        state: &mut SupervisorState,
        actions: Vec<SupervisorAction>,
    ) -> Result<(), String> {
        let delegations: Vec<TaskDelegation> = actions
            .iter()
            .filter_map(|action| match action {
                SupervisorAction::ConductResearch(task) => Some(task.clone()),
                _ => None,
            })
            .collect();

        let round = if delegations.is_empty() {
            None
        } else {
            tracing::info!(
                iteration = state.iterations,
                delegations = delegations.len(),
                "dispatching research"
            );
            match dispatcher.dispatch(&delegations).await {
                Ok(round) => Some(round),
                Err(err) => {
                    tracing::error!(error = %err, "dispatch round failed, ending supervision");
                    return Err(err.to_string());
                }
            }
        };

        let mut outcomes = round.as_ref().map(|r| r.outcomes.iter());
        for action in &actions {
            let message = match action {
                SupervisorAction::Think {
                    call_id,
                    reflection,
                } => tool_message(call_id, THINK_TOOL, reflection_recorded(reflection)),
                SupervisorAction::ConductResearch(task) => {
                    let text = outcomes
                        .as_mut()
                        .and_then(Iterator::next)
                        .map(|outcome| outcome.observation().to_string())
                        .unwrap_or_default();
                    tool_message(&task.call_id, CONDUCT_RESEARCH, text)
                }
                SupervisorAction::Unknown { call_id, name } => tool_message(
                    call_id,
                    name,
                    format!("Error: tool '{name}' is not available to the supervisor"),
                ),
                SupervisorAction::ResearchComplete => continue,
            };
            state.thread.push(message);
        }

        if let Some(round) = round {
            if !round.raw_notes.is_empty() {
                state.raw_notes.push(round.raw_notes);
            }
        }
        Ok(())
    }
}

fn tool_message(call_id: &str, name: &str, content: String) -> Message {
    let call = ToolCall::new(call_id, name, serde_json::Value::Null);
    Message::tool_result(&call, content)
}

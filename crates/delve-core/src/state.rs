//! Typed pipeline state
//!
//! Each field carries a fixed merge rule, applied only through the named
//! methods below:
//!
//! | field | rule |
//! |---|---|
//! | `messages` | append |
//! | `research_brief` | replace |
//! | `supervisor_messages` | override at brief, append during supervision |
//! | `notes` | replace, cleared by the report |
//! | `raw_notes` | append |
//! | `final_report` | replace |

use crate::error::PipelineError;
use crate::stage::{validate_transition, Stage};
use crate::types::Brief;
use delve_llm::{Message, Thread};
use serde::{Deserialize, Serialize};

/// Pipeline-level state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    stage: Stage,
    /// User-facing conversation
    pub messages: Thread,
    /// Brief produced by the scope resolver
    pub research_brief: Option<Brief>,
    /// Supervisor conversation
    pub supervisor_messages: Thread,
    /// Findings consumed by the final report
    pub notes: Vec<String>,
    /// Uncondensed worker output
    pub raw_notes: Vec<String>,
    /// Final report text
    pub final_report: Option<String>,
}

impl AgentState {
    /// Start from a user thread
    #[must_use]
    pub fn new(messages: Thread) -> Self {
        Self {
            stage: Stage::Clarify,
            messages,
            research_brief: None,
            supervisor_messages: Thread::new(),
            notes: Vec::new(),
            raw_notes: Vec::new(),
            final_report: None,
        }
    }

    /// Current stage
    #[inline]
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to `to` if the stage table allows it
    ///
    /// # Errors
    /// `PipelineError::InvalidTransition` otherwise.
    pub fn advance(&mut self, to: Stage) -> Result<(), PipelineError> {
        validate_transition(self.stage, to)?;
        tracing::debug!(from = ?self.stage, to = ?to, "stage transition");
        self.stage = to;
        Ok(())
    }

    /// Append the question the pipeline halts on
    pub fn apply_clarification(&mut self, question: &str) {
        self.messages.push(Message::assistant(question));
    }

    /// Append the confirmation emitted when no question is needed
    pub fn apply_verification(&mut self, verification: &str) {
        self.messages.push(Message::assistant(verification));
    }

    /// Store the brief and seed the supervisor thread (override)
    pub fn apply_brief(&mut self, brief: Brief, supervisor_seed: Vec<Message>) {
        self.research_brief = Some(brief);
        self.supervisor_messages.replace(supervisor_seed);
    }

    /// Merge a finished supervisor loop
    pub fn apply_supervision(&mut self, supervisor: SupervisorState, notes: Vec<String>) {
        self.supervisor_messages = supervisor.thread;
        self.notes = notes;
        self.raw_notes.extend(supervisor.raw_notes);
    }

    /// Store the report and consume the notes
    pub fn apply_report(&mut self, report: &str) {
        self.final_report = Some(report.to_string());
        self.messages.push(Message::assistant(report));
        self.notes.clear();
    }
}

/// Supervisor loop state, scoped to one loop invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupervisorState {
    /// Supervisor conversation
    pub thread: Thread,
    /// Planning iterations so far
    pub iterations: usize,
    /// Raw notes gathered from workers (append)
    pub raw_notes: Vec<String>,
}

impl SupervisorState {
    /// Start a loop over `thread` with the counter at zero
    #[inline]
    #[must_use]
    pub fn new(thread: Thread) -> Self {
        Self {
            thread,
            iterations: 0,
            raw_notes: Vec::new(),
        }
    }

    /// Check the iteration bound
    #[inline]
    #[must_use]
    pub fn exceeded(&self, max_iterations: usize) -> bool {
        self.iterations > max_iterations
    }
}

/// Worker loop state, private to one worker
#[derive(Debug, Clone, PartialEq)]
pub struct ResearcherState {
    /// Worker conversation
    pub thread: Thread,
    /// Tool-call iterations so far
    pub tool_call_iterations: usize,
}

impl ResearcherState {
    /// Start a worker on `topic`
    #[must_use]
    pub fn new(topic: &str) -> Self {
        Self {
            thread: Thread::from(vec![Message::user(topic)]),
            tool_call_iterations: 0,
        }
    }
}

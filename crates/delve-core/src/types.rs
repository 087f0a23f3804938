//! Core types for the research pipeline
//!
//! Defines:
//! - identifiers for delegations
//! - scope artifacts (brief, clarification request)
//! - structured model outputs
//! - supervisor actions decoded from tool calls
//! - worker results

use delve_llm::ToolCall;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Tool name the supervisor uses to delegate
pub const CONDUCT_RESEARCH: &str = "ConductResearch";

/// Tool name signalling that research is finished
pub const RESEARCH_COMPLETE: &str = "ResearchComplete";

/// Tool name for reflections
pub const THINK_TOOL: &str = "think_tool";

/// Condensed text used when compression gives up
pub const COMPRESSION_FAILED: &str = "Error synthesizing research report: Maximum retries exceeded";

/// Unique delegation identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Ulid);

impl TaskId {
    /// Generate new task ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structured plan handed to the supervisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brief(String);

impl Brief {
    /// Create brief
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Brief text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Brief {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Question the pipeline halted on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationRequest {
    /// Question for the user
    pub question: String,
    /// Always `true` when emitted by the scope resolver
    pub need_clarification: bool,
}

/// Clarification decision returned by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClarifyWithUser {
    /// Whether the user must be asked a question
    pub need_clarification: bool,
    /// Question to ask the user
    #[serde(default)]
    pub question: String,
    /// Confirmation that research will start
    #[serde(default)]
    pub verification: String,
}

/// Research brief returned by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchQuestion {
    /// Brief that guides the research
    pub research_brief: String,
}

/// Unit of work handed from the supervisor to one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDelegation {
    /// Correlates request and result
    pub id: TaskId,
    /// Originating tool call id
    pub call_id: String,
    /// Topic to research
    pub topic: String,
}

impl TaskDelegation {
    /// Create delegation for a topic
    #[must_use]
    pub fn new(call_id: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            call_id: call_id.into(),
            topic: topic.into(),
        }
    }
}

/// Output of one worker run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResult {
    /// Condensed findings, or [`COMPRESSION_FAILED`]
    pub compressed: String,
    /// Uncondensed tool and assistant text
    pub raw_notes: String,
}

impl WorkerResult {
    /// Condensed text, substituting the failure sentinel when empty
    #[must_use]
    pub fn compressed_or_sentinel(&self) -> &str {
        if self.compressed.trim().is_empty() {
            COMPRESSION_FAILED
        } else {
            &self.compressed
        }
    }
}

/// Supervisor action decoded from a tool call
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorAction {
    /// Delegate a topic to a worker
    ConductResearch(TaskDelegation),
    /// Research is finished
    ResearchComplete,
    /// Record a reflection
    Think {
        /// Call id to answer
        call_id: String,
        /// Reflection text
        reflection: String,
    },
    /// Tool name the supervisor does not know
    Unknown {
        /// Call id to answer
        call_id: String,
        /// Requested name
        name: String,
    },
}

impl SupervisorAction {
    /// Decode a tool call
    #[must_use]
    pub fn from_call(call: &ToolCall) -> Self {
        match call.name.as_str() {
            CONDUCT_RESEARCH => Self::ConductResearch(TaskDelegation::new(
                call.id.clone(),
                call.str_arg("research_topic").unwrap_or_default(),
            )),
            RESEARCH_COMPLETE => Self::ResearchComplete,
            THINK_TOOL => Self::Think {
                call_id: call.id.clone(),
                reflection: call.str_arg("reflection").unwrap_or_default().to_string(),
            },
            other => Self::Unknown {
                call_id: call.id.clone(),
                name: other.to_string(),
            },
        }
    }
}

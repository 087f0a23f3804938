//! Deep-research pipeline
//!
//! Drives the stage table end to end:
//! - scope (clarify, then brief)
//! - supervisor loop with worker fan-out
//! - final report
//!
//! Only scope-stage failures surface as `Err`; every later failure is folded
//! into the report text.

use crate::config::ResearchConfig;
use crate::dispatcher::{AdmissionPolicy, PrefixAdmission};
use crate::error::PipelineError;
use crate::scope::{ScopeDecision, ScopeResolver};
use crate::stage::Stage;
use crate::state::AgentState;
use crate::store::{
    persist, ArtifactStore, FsArtifactStore, NullStore, BRIEF_KEY, FINAL_REPORT_KEY,
};
use crate::supervisor::{Supervisor, SupervisorExit};
use crate::synthesizer::{FinalReport, Synthesizer};
use crate::tools::ToolRegistry;
use crate::types::{Brief, ClarificationRequest};
use crate::worker::Researcher;
use delve_llm::{LlmClient, Thread};
use std::sync::Arc;

/// Completed research run
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchReport {
    /// Brief the supervisor worked from
    pub brief: Brief,
    /// Report outcome
    pub report: FinalReport,
    /// Why supervision ended
    pub exit: SupervisorExit,
    /// Supervisor planning iterations
    pub iterations: usize,
    /// Final pipeline state
    pub state: AgentState,
}

/// Pipeline outcome
#[derive(Debug, Clone, PartialEq)]
pub enum ResearchOutcome {
    /// Halted on a clarifying question
    NeedsClarification {
        /// Question for the user
        request: ClarificationRequest,
        /// Pipeline state at the halt
        state: AgentState,
    },
    /// Report produced
    Completed(Box<ResearchReport>),
}

impl ResearchOutcome {
    /// Text to show the user
    #[must_use]
    pub fn display_text(&self) -> &str {
        match self {
            Self::NeedsClarification { request, .. } => &request.question,
            Self::Completed(report) => &report.report.report,
        }
    }
}

/// Deep-research orchestrator
///
/// Holds the shared client, immutable configuration, configured tools, and
/// artifact store for the lifetime of the process.
pub struct DeepResearcher {
    llm: LlmClient,
    config: ResearchConfig,
    tools: ToolRegistry,
    store: Arc<dyn ArtifactStore>,
    policy: Arc<dyn AdmissionPolicy>,
}

impl std::fmt::Debug for DeepResearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepResearcher")
            .field("llm", &self.llm)
            .field("config", &self.config)
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

impl DeepResearcher {
    /// Create orchestrator; artifacts go under `workspace_root` if configured
    #[must_use]
    pub fn new(llm: LlmClient, config: ResearchConfig, tools: ToolRegistry) -> Self {
        let store: Arc<dyn ArtifactStore> = match &config.workspace_root {
            Some(root) => Arc::new(FsArtifactStore::new(root)),
            None => Arc::new(NullStore),
        };
        Self {
            llm,
            config,
            tools,
            store,
            policy: Arc::new(PrefixAdmission),
        }
    }

    /// With artifact store
    #[inline]
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = store;
        self
    }

    /// With admission policy for dispatch rounds
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn AdmissionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Configuration in effect
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Run the pipeline over a user thread
    ///
    /// # Errors
    /// - `PipelineError::Scope` if clarification or brief writing fails
    /// - `PipelineError::InvalidTransition` on a stage-table violation
    pub async fn run(&self, messages: Thread) -> Result<ResearchOutcome, PipelineError> {
        let mut state = AgentState::new(messages);
        let scope = ScopeResolver::new(&self.llm, &self.config);
        tracing::info!(messages = state.messages.len(), "research run started");

        // Clarify
        match scope.clarify(&state.messages).await? {
            ScopeDecision::Clarify(request) => {
                state.advance(Stage::Halted)?;
                state.apply_clarification(&request.question);
                return Ok(ResearchOutcome::NeedsClarification { request, state });
            }
            ScopeDecision::Proceed { verification } => {
                if let Some(text) = verification {
                    state.apply_verification(&text);
                }
                state.advance(Stage::WriteBrief)?;
            }
        }

        // Brief
        let brief = scope.write_brief(&state.messages).await?;
        persist(self.store.as_ref(), BRIEF_KEY, brief.as_str()).await;
        let seed = scope.supervisor_seed(&brief);
        state.apply_brief(brief.clone(), seed);
        state.advance(Stage::Supervise)?;

        // Supervise
        let researcher =
            Researcher::new(&self.llm, &self.config, &self.tools, self.store.as_ref());
        let outcome = Supervisor::new(&self.llm, &self.config, &researcher)
            .with_policy(self.policy.as_ref())
            .supervise(state.supervisor_messages.clone())
            .await;
        let exit = outcome.exit.clone();
        let iterations = outcome.state.iterations;
        state.apply_supervision(outcome.state, outcome.notes);
        state.advance(Stage::Synthesize)?;

        // Synthesize
        let report = Synthesizer::new(&self.llm, &self.config)
            .synthesize(brief.as_str(), &state.messages, &state.notes, &state.raw_notes)
            .await;
        state.apply_report(&report.report);
        persist(self.store.as_ref(), FINAL_REPORT_KEY, &report.report).await;
        state.advance(Stage::Done)?;

        tracing::info!(
            iterations,
            exit = ?exit,
            succeeded = report.succeeded,
            "research run finished"
        );
        Ok(ResearchOutcome::Completed(Box::new(ResearchReport {
            brief,
            report,
            exit,
            iterations,
            state,
        })))
    }
}

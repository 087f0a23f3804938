//! Delve Core - deep-research orchestration
//!
//! Bounded supervisor/worker workflow layered on an LLM client:
//! - Scope resolution (clarify, then brief)
//! - Supervisor loop with an iteration cap
//! - Worker fan-out under a hard admission cap
//! - Worker act/observe loops with per-worker caps
//! - Compression with truncate-and-retry
//! - Final report with progressive truncation
//!
//! # Example
//!
//! ```rust,ignore
//! use delve_core::{DeepResearcher, ResearchConfig, ToolRegistry};
//! use delve_llm::{LlmClient, Message, Thread};
//!
//! # async fn example(llm: LlmClient, tools: ToolRegistry) -> anyhow::Result<()> {
//! let researcher = DeepResearcher::new(llm, ResearchConfig::new(), tools);
//! let outcome = researcher
//!     .run(Thread::from(vec![Message::user("Compare Rust async runtimes")]))
//!     .await?;
//! println!("{}", outcome.display_text());
//! # Ok(())
//! # }
//! ```

pub mod compressor;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod scope;
pub mod stage;
pub mod state;
pub mod store;
pub mod supervisor;
pub mod synthesizer;
pub mod telemetry;
pub mod tools;
pub mod types;
pub mod worker;

// Re-exports for convenience
pub use compressor::{compress, COMPRESSION_ATTEMPTS};
pub use config::{ModelConfig, ResearchConfig, WORKSPACE_ROOT_VAR};
pub use dispatcher::{
    rejection_message, AdmissionPolicy, DispatchOutcome, DispatchRound, DispatchStats, Dispatcher,
    PrefixAdmission, TaskRunner,
};
pub use error::{ConfigError, PipelineError, StoreError, ToolError};
pub use pipeline::{DeepResearcher, ResearchOutcome, ResearchReport};
pub use scope::{ScopeDecision, ScopeResolver};
pub use stage::{allowed_transitions, validate_transition, Stage};
pub use state::{AgentState, ResearcherState, SupervisorState};
pub use store::{
    persist, researcher_key, ArtifactStore, FsArtifactStore, NullStore, BRIEF_KEY, FINAL_REPORT_KEY,
};
pub use supervisor::{supervisor_tools, SupervisionOutcome, Supervisor, SupervisorExit};
pub use synthesizer::{FinalReport, Synthesizer, MAX_REPORT_RETRIES};
pub use tools::{
    execute_safely, reflection_recorded, ResearchCompleteTool, ThinkTool, Tool, ToolRegistry,
};
pub use types::{
    Brief, ClarificationRequest, SupervisorAction, TaskDelegation, TaskId, WorkerResult,
    COMPRESSION_FAILED,
};
pub use worker::{research_failed, Researcher};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Scope resolution
//!
//! Optional clarification decision, then a structured brief. When the model
//! asks for clarification the pipeline halts; the caller re-enters with a new
//! user turn.

use crate::config::ResearchConfig;
use crate::error::PipelineError;
use crate::prompts;
use crate::types::{Brief, ClarificationRequest, ClarifyWithUser, ResearchQuestion};
use delve_llm::{today_string, LlmClient, Message, Thread};

/// Scope decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeDecision {
    /// Halt and ask the user
    Clarify(ClarificationRequest),
    /// Continue to the brief; carries the confirmation text, if any
    Proceed {
        /// Confirmation shown to the user
        verification: Option<String>,
    },
}

/// Scope resolver
#[derive(Debug)]
pub struct ScopeResolver<'a> {
    llm: &'a LlmClient,
    config: &'a ResearchConfig,
}

impl<'a> ScopeResolver<'a> {
    /// Create resolver
    #[inline]
    #[must_use]
    pub fn new(llm: &'a LlmClient, config: &'a ResearchConfig) -> Self {
        Self { llm, config }
    }

    /// Decide whether a clarifying question is needed
    ///
    /// Makes no model call when clarification is disabled.
    ///
    /// # Errors
    /// `PipelineError::Scope` if the structured call fails after retries.
    pub async fn clarify(&self, messages: &Thread) -> Result<ScopeDecision, PipelineError> {
        if !self.config.allow_clarification {
            tracing::debug!("clarification disabled, skipping");
            return Ok(ScopeDecision::Proceed { verification: None });
        }

        let prompt = prompts::clarify_with_user(&messages.buffer_string(), &today_string());
        let decision: ClarifyWithUser = self
            .llm
            .invoke_structured(
                vec![Message::user(prompt)],
                self.config.research_model.settings(),
            )
            .await
            .map_err(PipelineError::Scope)?;

        if decision.need_clarification {
            tracing::info!(question = %decision.question, "clarification needed");
            Ok(ScopeDecision::Clarify(ClarificationRequest {
                question: decision.question,
                need_clarification: true,
            }))
        } else {
            Ok(ScopeDecision::Proceed {
                verification: Some(decision.verification),
            })
        }
    }

    /// Produce the research brief
    ///
    /// # Errors
    /// `PipelineError::Scope` if the structured call fails after retries.
    pub async fn write_brief(&self, messages: &Thread) -> Result<Brief, PipelineError> {
        let prompt = prompts::research_brief(&messages.buffer_string(), &today_string());
        let question: ResearchQuestion = self
            .llm
            .invoke_structured(
                vec![Message::user(prompt)],
                self.config.research_model.settings(),
            )
            .await
            .map_err(PipelineError::Scope)?;

        tracing::info!(chars = question.research_brief.len(), "research brief written");
        Ok(Brief::new(question.research_brief))
    }

    /// Seed messages for the supervisor thread
    #[must_use]
    pub fn supervisor_seed(&self, brief: &Brief) -> Vec<Message> {
        vec![
            Message::system(prompts::lead_researcher(
                &today_string(),
                self.config.max_concurrent_research_units,
                self.config.max_researcher_iterations,
            )),
            Message::user(brief.as_str()),
        ]
    }
}

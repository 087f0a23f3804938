//! Final report synthesis
//!
//! Progressive truncation on length-limit failures:
//! - first retry: budget = 4 characters per token of the model's context size
//! - each later retry: budget = 90% of the previous budget
//! - unknown context size or any other error: stop with an error report
//!
//! The outcome is always a displayable string.

use crate::config::ResearchConfig;
use crate::prompts;
use crate::telemetry;
use delve_llm::{
    model_token_limit, today_string, truncate_chars, ChatRequest, LlmClient, Message, Thread,
};

/// Truncation retries after the first attempt
pub const MAX_REPORT_RETRIES: usize = 3;

/// Characters assumed per token when sizing the findings budget
pub const CHARS_PER_TOKEN: usize = 4;

const ERROR_PREFIX: &str = "Error generating final report";

/// Outcome of report synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalReport {
    /// Report text, or an explanatory error string
    pub report: String,
    /// Whether the model produced the report
    pub succeeded: bool,
    /// Character budgets used by successive truncation retries
    pub budgets: Vec<usize>,
    /// Combined findings length before truncation
    pub compressed_research_length: usize,
    /// Combined raw-notes length
    pub raw_notes_length: usize,
}

impl FinalReport {
    /// Message appended to the user thread
    #[must_use]
    pub fn message(&self) -> Message {
        Message::assistant(self.report.clone())
    }
}

/// Final report writer
#[derive(Debug)]
pub struct Synthesizer<'a> {
    llm: &'a LlmClient,
    config: &'a ResearchConfig,
}

impl<'a> Synthesizer<'a> {
    /// Create synthesizer
    #[inline]
    #[must_use]
    pub fn new(llm: &'a LlmClient, config: &'a ResearchConfig) -> Self {
        Self { llm, config }
    }

    /// Write the report for `brief` from `notes`
    pub async fn synthesize(
        &self,
        brief: &str,
        messages: &Thread,
        notes: &[String],
        raw_notes: &[String],
    ) -> FinalReport {
        let findings = notes.join("\n");
        let compressed_research_length = findings.len();
        let raw_notes_length = raw_notes.iter().map(String::len).sum();
        telemetry::record_lengths(compressed_research_length, raw_notes_length);

        let model = &self.config.final_report_model;
        let settings = model.settings();
        let transcript = messages.buffer_string();
        let date = today_string();

        let mut budgets: Vec<usize> = Vec::new();
        let mut current: &str = &findings;
        let mut retries = 0;

        let (report, succeeded) = loop {
            let prompt = prompts::final_report(brief, &transcript, current, &date);
            let request = ChatRequest::new(vec![Message::user(prompt)], settings.clone());

            let err = match self.llm.invoke(request).await {
                Ok(response) => {
                    tracing::info!(
                        retries,
                        chars = response.content.len(),
                        "final report generated"
                    );
                    break (response.content, true);
                }
                Err(err) => err,
            };

            if !err.is_length_limit() {
                tracing::error!(error = %err, "final report failed");
                break (format!("{ERROR_PREFIX}: {err}"), false);
            }

            retries += 1;
            if retries > MAX_REPORT_RETRIES {
                break (format!("{ERROR_PREFIX}: Maximum retries exceeded"), false);
            }

            let budget = match budgets.last() {
                Some(previous) => previous * 9 / 10,
                None => match model_token_limit(&model.model) {
                    Some(limit) => limit * CHARS_PER_TOKEN,
                    None => {
                        tracing::error!(
                            model = %model.model,
                            "unknown context size, cannot truncate"
                        );
                        break (
                            format!(
                                "{ERROR_PREFIX}: Token limit exceeded, however, we could not \
                                 determine the model's maximum context length. Add the model to \
                                 the context-size table. {err}"
                            ),
                            false,
                        );
                    }
                },
            };
            budgets.push(budget);
            telemetry::record_truncation();
            current = truncate_chars(&findings, budget);
            tracing::warn!(
                retry = retries,
                budget,
                "final report hit length limit, truncating findings"
            );
        };

        FinalReport {
            report,
            succeeded,
            budgets,
            compressed_research_length,
            raw_notes_length,
        }
    }
}

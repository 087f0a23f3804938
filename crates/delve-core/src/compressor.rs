//! Worker transcript compression
//!
//! `compress` never fails outward. Length-limit failures shrink the thread
//! back to before the most recent assistant turn, other failures retry the
//! same input, and exhaustion yields [`COMPRESSION_FAILED`]. Raw notes come
//! from the transcript as handed in, so truncation never loses them.

use crate::prompts;
use crate::telemetry;
use crate::types::{WorkerResult, COMPRESSION_FAILED};
use delve_llm::{today_string, ChatRequest, LlmClient, Message, ModelSettings, Thread};

/// Attempts before giving up
pub const COMPRESSION_ATTEMPTS: usize = 3;

/// Compress a worker thread into condensed findings plus raw notes
pub async fn compress(
    llm: &LlmClient,
    settings: &ModelSettings,
    mut thread: Thread,
) -> WorkerResult {
    let raw_notes = thread.tool_and_assistant_text();
    let system = Message::system(prompts::compress_research_system(&today_string()));
    thread.push(Message::user(prompts::COMPRESS_RESEARCH_HUMAN));

    for attempt in 1..=COMPRESSION_ATTEMPTS {
        let mut messages = Vec::with_capacity(thread.len() + 1);
        messages.push(system.clone());
        messages.extend(thread.messages().iter().cloned());

        match llm.invoke(ChatRequest::new(messages, settings.clone())).await {
            Ok(response) => {
                tracing::debug!(attempt, chars = response.content.len(), "research compressed");
                return WorkerResult {
                    compressed: response.content,
                    raw_notes,
                };
            }
            Err(err) if err.is_length_limit() => {
                telemetry::record_compression_failure(true);
                let before = thread.len();
                thread.remove_through_last_assistant();
                let instructed = thread
                    .last()
                    .is_some_and(|m| m.content == prompts::COMPRESS_RESEARCH_HUMAN);
                if !instructed {
                    thread.push(Message::user(prompts::COMPRESS_RESEARCH_HUMAN));
                }
                tracing::warn!(
                    attempt,
                    before,
                    after = thread.len(),
                    "compression hit length limit, truncating thread"
                );
            }
            Err(err) => {
                telemetry::record_compression_failure(false);
                tracing::warn!(attempt, error = %err, "compression failed, retrying");
            }
        }
    }

    tracing::error!(attempts = COMPRESSION_ATTEMPTS, "compression exhausted");
    WorkerResult {
        compressed: COMPRESSION_FAILED.to_string(),
        raw_notes,
    }
}

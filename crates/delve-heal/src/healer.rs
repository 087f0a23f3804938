//! Self-healing loop
//!
//! Runs code once; on failure, alternates classify, patch and re-run until
//! the code passes or `max_retries` patches have been tried. Every patch is
//! recorded in the report history. LLM failures end the loop early with a
//! failed report rather than an error.

use crate::config::HealConfig;
use crate::error::HealError;
use crate::executor::CodeExecutor;
use crate::outcome::{ExecutionOutcome, HealingRecord, HealingReport, RefactorReport};
use crate::prompts;
use crate::state::{HealMachine, HealState};
use delve_llm::{strip_code_fence, ChatRequest, LlmClient, Message};
use metrics::{counter, histogram};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};

/// Runs that ended in success
pub const HEAL_SUCCESS: &str = "delve.heal.success";
/// Runs that ended without passing code
pub const HEAL_FAILURE: &str = "delve.heal.failure";
/// Patch attempts used per run
pub const HEAL_ATTEMPTS: &str = "delve.heal.attempts";

/// Self-healing driver
pub struct SelfHealer<'a> {
    llm: &'a LlmClient,
    executor: &'a dyn CodeExecutor,
    config: &'a HealConfig,
}

impl<'a> SelfHealer<'a> {
    /// Create a healer
    #[must_use]
    pub fn new(llm: &'a LlmClient, executor: &'a dyn CodeExecutor, config: &'a HealConfig) -> Self {
        Self {
            llm,
            executor,
            config,
        }
    }

    /// Heal `code` until it passes `test_command` (or the compile check)
    #[instrument(skip(self, code, related_docs), fields(file = %file_path.display()))]
    pub async fn heal(
        &self,
        code: &str,
        file_path: &Path,
        test_command: Option<&str>,
        related_docs: Option<&str>,
    ) -> HealingReport {
        let max = self.config.max_retries;
        let mut machine = HealMachine::default();
        let mut current = code.to_string();
        let mut history = Vec::new();

        let mut outcome = self.execute(&current, file_path, test_command).await;
        if outcome.success {
            step(&mut machine, HealState::Success);
            return finish(HealingReport {
                success: true,
                final_code: current,
                attempts: 0,
                history,
                message: "Code executed successfully on first attempt".to_string(),
                last_error: None,
            });
        }

        for attempt in 1..=max {
            step(&mut machine, HealState::Classify);
            let category = outcome.category_or_unknown();
            let error_text = outcome.error_text().to_string();
            info!(attempt, %category, "execution failed, patching");

            step(&mut machine, HealState::Patch);
            let patch = match self
                .generate_patch(&current, &error_text, category, attempt, related_docs)
                .await
            {
                Ok(patch) => patch,
                Err(err) => {
                    error!(attempt, error = %err, "patch generation failed");
                    step(&mut machine, HealState::Exhausted);
                    return finish(HealingReport {
                        success: false,
                        final_code: current,
                        attempts: attempt - 1,
                        history,
                        message: format!("Patch generation failed: {err}"),
                        last_error: Some(error_text),
                    });
                }
            };

            step(&mut machine, HealState::Execute);
            let next = self.execute(&patch, file_path, test_command).await;
            history.push(HealingRecord {
                attempt,
                error: error_text,
                category,
                patch: patch.clone(),
                outcome: next.clone(),
            });
            current = patch;

            if next.success {
                step(&mut machine, HealState::Success);
                return finish(HealingReport {
                    success: true,
                    final_code: current,
                    attempts: attempt,
                    history,
                    message: format!("Code healed successfully after {attempt} attempt(s)"),
                    last_error: None,
                });
            }
            outcome = next;
        }

        step(&mut machine, HealState::Classify);
        step(&mut machine, HealState::Exhausted);
        warn!(attempts = max, "healing exhausted");
        finish(HealingReport {
            success: false,
            final_code: current,
            attempts: max,
            history,
            message: format!("Failed to heal code after {max} attempts"),
            last_error: outcome.error,
        })
    }

    /// Generate unit tests for `code`
    ///
    /// # Errors
    /// `HealError::Llm` if the model call fails.
    pub async fn generate_unit_tests(
        &self,
        code: &str,
        file_path: &Path,
        framework: &str,
    ) -> Result<String, HealError> {
        let messages = vec![
            Message::system(prompts::TESTS_SYSTEM),
            Message::user(prompts::tests_request(
                code,
                &file_path.display().to_string(),
                framework,
            )),
        ];
        let response = self
            .llm
            .invoke(ChatRequest::new(messages, self.config.model.clone()))
            .await?;
        Ok(strip_code_fence(&response.content))
    }

    /// Heal, generate tests next to the file, then run them
    ///
    /// Healing failure returns early with no tests. A test-generation
    /// failure keeps the healed code and reports `test_passed = false`.
    #[instrument(skip(self, code, related_docs), fields(file = %file_path.display()))]
    pub async fn refactor_with_tests(
        &self,
        code: &str,
        file_path: &Path,
        related_docs: Option<&str>,
    ) -> RefactorReport {
        let healing = self.heal(code, file_path, None, related_docs).await;
        if !healing.success {
            return RefactorReport {
                success: false,
                code: healing.final_code.clone(),
                tests: None,
                test_file: None,
                test_passed: false,
                healing_attempts: healing.attempts,
                healing,
            };
        }

        let tests = match self
            .generate_unit_tests(&healing.final_code, file_path, &self.config.test_framework)
            .await
        {
            Ok(tests) => tests,
            Err(err) => {
                warn!(error = %err, "test generation failed");
                return RefactorReport {
                    success: true,
                    code: healing.final_code.clone(),
                    tests: None,
                    test_file: None,
                    test_passed: false,
                    healing_attempts: healing.attempts,
                    healing,
                };
            }
        };

        let test_path = test_path_for(file_path);
        let run = self
            .executor
            .run(
                &tests,
                &test_path,
                Some(&self.config.test_command),
                self.config.timeout(),
            )
            .await;
        debug!(passed = run.success, path = %test_path.display(), "generated tests executed");

        RefactorReport {
            success: true,
            code: healing.final_code.clone(),
            tests: Some(tests),
            test_file: Some(test_path.display().to_string()),
            test_passed: run.success,
            healing_attempts: healing.attempts,
            healing,
        }
    }

    async fn execute(
        &self,
        code: &str,
        file_path: &Path,
        test_command: Option<&str>,
    ) -> ExecutionOutcome {
        self.executor
            .run(code, file_path, test_command, self.config.timeout())
            .await
    }

    async fn generate_patch(
        &self,
        code: &str,
        error: &str,
        category: crate::outcome::ErrorCategory,
        attempt: u32,
        docs: Option<&str>,
    ) -> Result<String, HealError> {
        let messages = vec![
            Message::system(prompts::PATCH_SYSTEM),
            Message::user(prompts::patch_request(
                code,
                category,
                error,
                attempt,
                self.config.max_retries,
                docs,
            )),
        ];
        let response = self
            .llm
            .invoke(ChatRequest::new(messages, self.config.model.clone()))
            .await?;
        Ok(strip_code_fence(&response.content))
    }
}

/// `test_{name}` in the same directory as `file_path`
#[must_use]
pub fn test_path_for(file_path: &Path) -> PathBuf {
    let name = file_path
        .file_name()
        .map_or_else(|| "code.py".to_string(), |n| n.to_string_lossy().into_owned());
    file_path.with_file_name(format!("test_{name}"))
}

fn step(machine: &mut HealMachine, to: HealState) {
    if let Err(err) = machine.advance(to) {
        error!(error = %err, "healing state table violated");
    }
}

fn finish(report: HealingReport) -> HealingReport {
    let name = if report.success {
        HEAL_SUCCESS
    } else {
        HEAL_FAILURE
    };
    counter!(name).increment(1);
    histogram!(HEAL_ATTEMPTS).record(f64::from(report.attempts));
    report
}

//! Code execution
//!
//! - `CodeExecutor`: seam between the healing loop and the outside world
//! - `ProcessExecutor`: writes the file, then runs a shell command with a
//!   hard timeout
//!
//! Failures never surface as `Err`; they come back as an unsuccessful
//! `ExecutionOutcome` so the loop can classify and patch them.

use crate::classifier::classify;
use crate::config::{render_command, HealConfig};
use crate::outcome::{ErrorCategory, ExecutionOutcome};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs code and reports what happened
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Persist `code` at `target` and run `test_command` (or the default
    /// check) against it
    async fn run(
        &self,
        code: &str,
        target: &Path,
        test_command: Option<&str>,
        timeout: Duration,
    ) -> ExecutionOutcome;
}

/// Shell-backed executor
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    work_dir: PathBuf,
    compile_command: String,
}

impl ProcessExecutor {
    /// Create an executor rooted at `work_dir`
    #[must_use]
    pub fn new(work_dir: impl Into<PathBuf>, compile_command: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            compile_command: compile_command.into(),
        }
    }

    /// Executor matching a healing configuration
    #[must_use]
    pub fn from_config(config: &HealConfig) -> Self {
        Self::new(config.work_dir.clone(), config.compile_command.clone())
    }

    /// Working directory
    #[inline]
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn resolve(&self, target: &Path) -> PathBuf {
        if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.work_dir.join(target)
        }
    }
}

#[async_trait]
impl CodeExecutor for ProcessExecutor {
    async fn run(
        &self,
        code: &str,
        target: &Path,
        test_command: Option<&str>,
        timeout: Duration,
    ) -> ExecutionOutcome {
        let path = self.resolve(target);
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ExecutionOutcome::failed(e.to_string(), ErrorCategory::Unknown, -1);
            }
        }
        if let Err(e) = tokio::fs::write(&path, code).await {
            warn!(path = %path.display(), error = %e, "failed to write code");
            return ExecutionOutcome::failed(e.to_string(), ErrorCategory::Unknown, -1);
        }

        let command = test_command.map_or_else(
            || render_command(&self.compile_command, &path),
            |cmd| render_command(cmd, &path),
        );
        debug!(command = %command, "executing");

        let child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                return ExecutionOutcome::failed(e.to_string(), ErrorCategory::Unknown, -1);
            }
        };

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Err(_) => ExecutionOutcome::failed(
                format!("Execution timeout ({}s)", timeout.as_secs()),
                ErrorCategory::Runtime,
                -1,
            ),
            Ok(Err(e)) => ExecutionOutcome::failed(e.to_string(), ErrorCategory::Unknown, -1),
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let code = output.status.code().unwrap_or(-1);
                if output.status.success() {
                    ExecutionOutcome::passed(stdout)
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                    // pytest reports failures on stdout
                    let error = if stderr.trim().is_empty() {
                        stdout.clone()
                    } else {
                        stderr
                    };
                    ExecutionOutcome::failed(error.clone(), classify(&error), code)
                        .with_stdout(stdout)
                }
            }
        }
    }
}

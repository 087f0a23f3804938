//! Delve Self-Healing Loop
//!
//! Executes code, classifies failures, asks a model for a patch and retries
//! under a fixed attempt cap.
//!
//! # Modules
//!
//! - `classifier`: ordered error-pattern table
//! - `executor`: `CodeExecutor` seam and the shell-backed implementation
//! - `healer`: `SelfHealer` driving heal, test generation and refactor
//! - `state`: healing state table
//! - `outcome`: execution outcomes and reports

pub mod classifier;
pub mod config;
pub mod error;
pub mod executor;
pub mod healer;
pub mod outcome;
pub mod prompts;
pub mod state;

pub use classifier::classify;
pub use config::{render_command, HealConfig, FILE_PLACEHOLDER};
pub use error::HealError;
pub use executor::{CodeExecutor, ProcessExecutor};
pub use healer::{test_path_for, SelfHealer};
pub use outcome::{ErrorCategory, ExecutionOutcome, HealingRecord, HealingReport, RefactorReport};
pub use state::{allowed_transitions, validate_transition, HealMachine, HealState};

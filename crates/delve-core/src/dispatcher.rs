//! Worker pool dispatcher
//!
//! Admission control for one supervisor round:
//! - the admission policy splits delegations into admitted and rejected
//! - admitted delegations run concurrently behind an all-complete barrier
//! - each rejected delegation gets a textual rejection naming the cap
//! - results are returned in request order
//!
//! Nothing is queued for a later round.

use crate::error::PipelineError;
use crate::telemetry;
use crate::types::{TaskDelegation, WorkerResult};
use async_trait::async_trait;
use futures::future::join_all;

/// Runs one delegation to completion
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Research `task` and return its condensed and raw notes
    async fn run(&self, task: &TaskDelegation) -> Result<WorkerResult, PipelineError>;
}

/// Decides which delegations of a round are admitted
pub trait AdmissionPolicy: Send + Sync {
    /// Indices (into `delegations`) to admit, at most `cap` of them
    fn admit(&self, delegations: &[TaskDelegation], cap: usize) -> Vec<usize>;
}

/// Admit the first `cap` delegations in request order
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixAdmission;

impl AdmissionPolicy for PrefixAdmission {
    fn admit(&self, delegations: &[TaskDelegation], cap: usize) -> Vec<usize> {
        (0..delegations.len().min(cap)).collect()
    }
}

/// Rejection text for a delegation over the cap
#[must_use]
pub fn rejection_message(cap: usize) -> String {
    format!(
        "Error: Did not run this research as you have already exceeded the maximum number of \
         concurrent research units. Please try again with {cap} or fewer research units."
    )
}

/// Outcome for one delegation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Worker ran
    Completed(WorkerResult),
    /// Over the concurrency cap
    Rejected(String),
}

impl DispatchOutcome {
    /// Text returned to the supervisor as the tool result
    #[must_use]
    pub fn observation(&self) -> &str {
        match self {
            Self::Completed(result) => result.compressed_or_sentinel(),
            Self::Rejected(message) => message,
        }
    }
}

/// Dispatch statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Delegations run
    pub admitted: usize,
    /// Delegations rejected
    pub rejected: usize,
}

/// Result of one dispatch round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRound {
    /// `outcomes[i]` answers `delegations[i]`
    pub outcomes: Vec<DispatchOutcome>,
    /// Newline-joined raw notes of every admitted worker
    pub raw_notes: String,
    /// Admission counts
    pub stats: DispatchStats,
}

/// Worker pool dispatcher with a hard admission cap
pub struct Dispatcher<'a> {
    runner: &'a dyn TaskRunner,
    policy: &'a dyn AdmissionPolicy,
    max_concurrent: usize,
}

impl std::fmt::Debug for Dispatcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("max_concurrent", &self.max_concurrent)
            .finish_non_exhaustive()
    }
}

impl<'a> Dispatcher<'a> {
    /// Create dispatcher with prefix admission
    #[inline]
    #[must_use]
    pub fn new(runner: &'a dyn TaskRunner, max_concurrent: usize) -> Self {
        Self {
            runner,
            policy: &PrefixAdmission,
            max_concurrent,
        }
    }

    /// With a different admission policy
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: &'a dyn AdmissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Concurrency cap
    #[inline]
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run one round
    ///
    /// # Errors
    /// `PipelineError::DispatchFailed` if an admitted worker could not run at
    /// all (no tools). Workers resolve model failures to text themselves.
    pub async fn dispatch(
        &self,
        delegations: &[TaskDelegation],
    ) -> Result<DispatchRound, PipelineError> {
        let mut admitted = self.policy.admit(delegations, self.max_concurrent);
        admitted.sort_unstable();
        admitted.dedup();
        admitted.retain(|&idx| idx < delegations.len());
        admitted.truncate(self.max_concurrent);

        let stats = DispatchStats {
            admitted: admitted.len(),
            rejected: delegations.len() - admitted.len(),
        };
        telemetry::record_dispatch(stats.admitted, stats.rejected);
        if stats.rejected > 0 {
            tracing::warn!(
                requested = delegations.len(),
                admitted = stats.admitted,
                rejected = stats.rejected,
                cap = self.max_concurrent,
                "delegations over concurrency cap rejected"
            );
        }

        let runs = join_all(
            admitted
                .iter()
                .map(|&idx| self.runner.run(&delegations[idx])),
        )
        .await;

        let mut completed: Vec<Option<WorkerResult>> = vec![None; delegations.len()];
        for (&idx, run) in admitted.iter().zip(runs) {
            let result = run.map_err(|err| {
                tracing::error!(task = %delegations[idx].id, error = %err, "worker failed");
                PipelineError::DispatchFailed(err.to_string())
            })?;
            completed[idx] = Some(result);
        }

        let raw_notes = completed
            .iter()
            .flatten()
            .map(|result| result.raw_notes.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let rejection = rejection_message(self.max_concurrent);
        let outcomes = completed
            .into_iter()
            .map(|slot| match slot {
                Some(result) => DispatchOutcome::Completed(result),
                None => DispatchOutcome::Rejected(rejection.clone()),
            })
            .collect();

        Ok(DispatchRound {
            outcomes,
            raw_notes,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl TaskRunner for Echo {
        async fn run(&self, task: &TaskDelegation) -> Result<WorkerResult, PipelineError> {
            Ok(WorkerResult {
                compressed: format!("summary of {}", task.topic),
                raw_notes: format!("raw {}", task.topic),
            })
        }
    }

    struct FailOn(&'static str);

    #[async_trait]
    impl TaskRunner for FailOn {
        async fn run(&self, task: &TaskDelegation) -> Result<WorkerResult, PipelineError> {
            if task.topic == self.0 {
                Err(PipelineError::NoTools)
            } else {
                Echo.run(task).await
            }
        }
    }

    struct LastFirst;

    impl AdmissionPolicy for LastFirst {
        fn admit(&self, delegations: &[TaskDelegation], cap: usize) -> Vec<usize> {
            (0..delegations.len()).rev().take(cap).collect()
        }
    }

    fn tasks(topics: &[&str]) -> Vec<TaskDelegation> {
        topics
            .iter()
            .enumerate()
            .map(|(i, t)| TaskDelegation::new(format!("call_{i}"), *t))
            .collect()
    }

    #[tokio::test]
    async fn prefix_is_admitted_rest_rejected() {
        let round = Dispatcher::new(&Echo, 2)
            .dispatch(&tasks(&["a", "b", "c"]))
            .await
            .unwrap();

        assert_eq!(round.stats, DispatchStats { admitted: 2, rejected: 1 });
        assert_eq!(round.outcomes[0].observation(), "summary of a");
        assert_eq!(round.outcomes[1].observation(), "summary of b");
        assert_eq!(round.outcomes[2].observation(), rejection_message(2));
        assert_eq!(round.raw_notes, "raw a\nraw b");
    }

    #[tokio::test]
    async fn custom_policy_keeps_positions() {
        let round = Dispatcher::new(&Echo, 1)
            .with_policy(&LastFirst)
            .dispatch(&tasks(&["a", "b"]))
            .await
            .unwrap();

        assert!(matches!(round.outcomes[0], DispatchOutcome::Rejected(_)));
        assert_eq!(round.outcomes[1].observation(), "summary of b");
    }

    #[tokio::test]
    async fn worker_failure_fails_the_round() {
        let err = Dispatcher::new(&FailOn("b"), 5)
            .dispatch(&tasks(&["a", "b"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::DispatchFailed(_)));
    }

    #[tokio::test]
    async fn empty_round_is_empty() {
        let round = Dispatcher::new(&Echo, 3).dispatch(&[]).await.unwrap();
        assert!(round.outcomes.is_empty());
        assert_eq!(round.raw_notes, "");
    }

    #[test]
    fn rejection_names_cap() {
        assert!(rejection_message(2).contains("try again with 2 or fewer"));
    }
}

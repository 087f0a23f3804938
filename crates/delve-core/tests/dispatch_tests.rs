//! Dispatcher admission and fan-out tests.
//!
//! - delegations over the cap are rejected with a message naming the cap
//! - admitted delegations run concurrently and answer in request order
//! - a worker that cannot run at all fails the whole round

use async_trait::async_trait;
use delve_core::{
    rejection_message, AdmissionPolicy, DispatchOutcome, Dispatcher, PipelineError, TaskDelegation,
    TaskRunner, WorkerResult,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

fn delegations(n: usize) -> Vec<TaskDelegation> {
    (0..n)
        .map(|i| TaskDelegation::new(format!("call_{i}"), format!("topic {i}")))
        .collect()
}

/// Echoes the topic; tracks how many runs overlap.
#[derive(Default)]
struct CountingRunner {
    started: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl TaskRunner for CountingRunner {
    async fn run(&self, task: &TaskDelegation) -> Result<WorkerResult, PipelineError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(WorkerResult {
            compressed: format!("findings for {}", task.topic),
            raw_notes: format!("raw {}", task.topic),
        })
    }
}

/// Blocks until `n` runs have started.
struct BarrierRunner {
    barrier: Arc<Barrier>,
}

#[async_trait]
impl TaskRunner for BarrierRunner {
    async fn run(&self, task: &TaskDelegation) -> Result<WorkerResult, PipelineError> {
        self.barrier.wait().await;
        Ok(WorkerResult {
            compressed: task.topic.clone(),
            raw_notes: String::new(),
        })
    }
}

struct FailingRunner;

#[async_trait]
impl TaskRunner for FailingRunner {
    async fn run(&self, task: &TaskDelegation) -> Result<WorkerResult, PipelineError> {
        if task.topic.ends_with('1') {
            Err(PipelineError::NoTools)
        } else {
            Ok(WorkerResult {
                compressed: "ok".into(),
                raw_notes: String::new(),
            })
        }
    }
}

/// Admits delegations from the back.
struct SuffixAdmission;

impl AdmissionPolicy for SuffixAdmission {
    fn admit(&self, delegations: &[TaskDelegation], cap: usize) -> Vec<usize> {
        let n = delegations.len();
        (n.saturating_sub(cap)..n).collect()
    }
}

/// Five delegations against a cap of two: two run, three are rejected.
#[tokio::test]
async fn over_cap_delegations_are_rejected() {
    let runner = CountingRunner::default();
    let dispatcher = Dispatcher::new(&runner, 2);

    let round = dispatcher.dispatch(&delegations(5)).await.unwrap();

    assert_eq!(runner.started.load(Ordering::SeqCst), 2);
    assert_eq!(round.stats.admitted, 2);
    assert_eq!(round.stats.rejected, 3);
    assert_eq!(round.outcomes.len(), 5);

    let rejected: Vec<_> = round
        .outcomes
        .iter()
        .filter_map(|o| match o {
            DispatchOutcome::Rejected(message) => Some(message.clone()),
            DispatchOutcome::Completed(_) => None,
        })
        .collect();
    assert_eq!(rejected.len(), 3);
    for message in &rejected {
        assert_eq!(message, &rejection_message(2));
        assert!(message.contains("2 or fewer"));
    }
}

/// Admitted workers overlap; a serial pool would never pass the barrier.
#[tokio::test]
async fn admitted_workers_run_concurrently() {
    let runner = BarrierRunner {
        barrier: Arc::new(Barrier::new(2)),
    };
    let dispatcher = Dispatcher::new(&runner, 2);

    let round = tokio::time::timeout(Duration::from_secs(5), dispatcher.dispatch(&delegations(5)))
        .await
        .expect("admitted workers did not run concurrently")
        .unwrap();
    assert_eq!(round.stats.admitted, 2);

    let counting = CountingRunner::default();
    Dispatcher::new(&counting, 3)
        .dispatch(&delegations(3))
        .await
        .unwrap();
    assert!(counting.peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn outcomes_follow_request_order() {
    let runner = CountingRunner::default();
    let round = Dispatcher::new(&runner, 5)
        .dispatch(&delegations(3))
        .await
        .unwrap();

    let observations: Vec<_> = round.outcomes.iter().map(DispatchOutcome::observation).collect();
    assert_eq!(
        observations,
        vec!["findings for topic 0", "findings for topic 1", "findings for topic 2"]
    );
    assert_eq!(round.raw_notes, "raw topic 0\nraw topic 1\nraw topic 2");
}

#[tokio::test]
async fn custom_policy_picks_admitted_set() {
    let runner = CountingRunner::default();
    let round = Dispatcher::new(&runner, 2)
        .with_policy(&SuffixAdmission)
        .dispatch(&delegations(4))
        .await
        .unwrap();

    assert!(matches!(round.outcomes[0], DispatchOutcome::Rejected(_)));
    assert!(matches!(round.outcomes[1], DispatchOutcome::Rejected(_)));
    assert_eq!(round.outcomes[3].observation(), "findings for topic 3");
}

#[tokio::test]
async fn failed_worker_fails_round() {
    let err = Dispatcher::new(&FailingRunner, 3)
        .dispatch(&delegations(3))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::DispatchFailed(_)));
}

#[tokio::test]
async fn empty_round_runs_nothing() {
    let runner = CountingRunner::default();
    let round = Dispatcher::new(&runner, 2).dispatch(&[]).await.unwrap();
    assert!(round.outcomes.is_empty());
    assert_eq!(runner.started.load(Ordering::SeqCst), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// For any cap below the request count: exactly `cap` run, the rest are
    /// rejected with a message naming the cap.
    #[test]
    fn admission_is_capped(cap in 1usize..6, extra in 1usize..6) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let runner = CountingRunner::default();
        let requested = cap + extra;

        let round = runtime
            .block_on(Dispatcher::new(&runner, cap).dispatch(&delegations(requested)))
            .unwrap();

        prop_assert_eq!(runner.started.load(Ordering::SeqCst), cap);
        prop_assert!(runner.peak.load(Ordering::SeqCst) <= cap);
        prop_assert_eq!(round.stats.admitted, cap);
        prop_assert_eq!(round.stats.rejected, extra);
        prop_assert_eq!(round.outcomes.len(), requested);

        let expected = format!("{cap} or fewer");
        let mut rejections = 0;
        for outcome in &round.outcomes {
            if let DispatchOutcome::Rejected(message) = outcome {
                prop_assert!(message.contains(&expected));
                rejections += 1;
            }
        }
        prop_assert_eq!(rejections, extra);
    }
}

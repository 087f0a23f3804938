//! End-to-end pipeline tests against a routed fake model.

use delve_core::{
    allowed_transitions, researcher_key, validate_transition, DeepResearcher, PipelineError,
    ResearchOutcome, Stage, SupervisorExit, ToolRegistry, BRIEF_KEY, FINAL_REPORT_KEY,
};
use delve_llm::{ChatRequest, ChatResponse, LlmError, LlmResult, Message, Role, Thread};
use delve_test_utils::{
    brief_reply, clarify_reply, client, complete_call, conduct_research_call, quick_config,
    tool_call, FnModel, MemoryStore, RequestKind, StaticTool,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn question() -> Thread {
    Thread::from(vec![Message::user("How do Rust async runtimes differ?")])
}

fn search_tools() -> ToolRegistry {
    ToolRegistry::new().with_tool(StaticTool::new("web_search", "tokio uses work stealing"))
}

/// Routes every stage to a plausible reply:
/// - supervisor delegates once, then completes
/// - worker searches once, then answers in text
fn happy_path(kind: RequestKind, request: &ChatRequest) -> LlmResult<ChatResponse> {
    let fresh = !request.messages.iter().any(|m| m.role == Role::Assistant);
    Ok(match kind {
        RequestKind::Clarify => clarify_reply(false, "", "Starting research now."),
        RequestKind::Brief => brief_reply("Compare scheduling in tokio and smol."),
        RequestKind::Supervisor if fresh => ChatResponse::with_calls(
            "",
            vec![conduct_research_call("c1", "tokio scheduler")],
        ),
        RequestKind::Supervisor => ChatResponse::with_calls("", vec![complete_call("c2")]),
        RequestKind::Researcher if fresh => ChatResponse::with_calls(
            "",
            vec![tool_call("w1", "web_search", json!({"query": "tokio"}))],
        ),
        RequestKind::Researcher => ChatResponse::text("tokio schedules tasks with work stealing"),
        RequestKind::Compression => ChatResponse::text("tokio: work-stealing scheduler [1]"),
        RequestKind::FinalReport => ChatResponse::text("# Async runtimes\n\nTokio steals work."),
        RequestKind::Other => return Err(LlmError::Other("unexpected request".into())),
    })
}

#[tokio::test]
async fn full_run_produces_report_and_artifacts() {
    let model = Arc::new(FnModel::new(happy_path));
    let store = MemoryStore::new();
    let researcher = DeepResearcher::new(client(model.clone()), quick_config(), search_tools())
        .with_store(store.clone());

    let outcome = researcher.run(question()).await.unwrap();

    let ResearchOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(report.exit, SupervisorExit::ResearchComplete);
    assert_eq!(report.iterations, 2);
    assert!(report.report.succeeded);
    assert_eq!(report.report.report, "# Async runtimes\n\nTokio steals work.");
    assert_eq!(report.brief.as_str(), "Compare scheduling in tokio and smol.");
    assert_eq!(report.state.stage(), Stage::Done);
    assert_eq!(
        report.state.notes,
        vec!["tokio: work-stealing scheduler [1]".to_string()]
    );
    assert!(report.state.raw_notes[0].contains("tokio uses work stealing"));

    assert_eq!(
        store.get(BRIEF_KEY).as_deref(),
        Some("Compare scheduling in tokio and smol.")
    );
    assert_eq!(
        store.get(FINAL_REPORT_KEY).as_deref(),
        Some("# Async runtimes\n\nTokio steals work.")
    );
    let compressed = store
        .keys()
        .into_iter()
        .filter(|k| k.starts_with("researcher_") && k.ends_with("/compressed.md"))
        .count();
    assert_eq!(compressed, 1);

    assert_eq!(model.calls(RequestKind::Clarify), 0);
    assert_eq!(model.calls(RequestKind::Researcher), 2);
    assert_eq!(model.calls(RequestKind::Compression), 1);
}

#[tokio::test]
async fn clarification_halts_before_research() {
    let model = Arc::new(FnModel::new(|kind, request| match kind {
        RequestKind::Clarify => Ok(clarify_reply(true, "Which runtimes do you mean?", "")),
        _ => happy_path(kind, request),
    }));
    let config = quick_config().with_clarification(true);
    let researcher = DeepResearcher::new(client(model.clone()), config, search_tools());

    let outcome = researcher.run(question()).await.unwrap();

    let ResearchOutcome::NeedsClarification { request, state } = outcome else {
        panic!("expected a clarification halt");
    };
    assert_eq!(request.question, "Which runtimes do you mean?");
    assert_eq!(state.stage(), Stage::Halted);
    assert_eq!(
        state.messages.last().map(|m| m.content.as_str()),
        Some("Which runtimes do you mean?")
    );
    assert_eq!(model.calls(RequestKind::Clarify), 1);
    assert_eq!(model.calls(RequestKind::Brief), 0);
    assert_eq!(model.calls(RequestKind::Supervisor), 0);
}

#[tokio::test]
async fn verification_is_recorded_when_proceeding() {
    let model = Arc::new(FnModel::new(happy_path));
    let config = quick_config().with_clarification(true);
    let researcher = DeepResearcher::new(client(model.clone()), config, search_tools());

    let ResearchOutcome::Completed(report) = researcher.run(question()).await.unwrap() else {
        panic!("expected a completed run");
    };
    assert!(report
        .state
        .messages
        .messages()
        .iter()
        .any(|m| m.content == "Starting research now."));
    assert_eq!(model.calls(RequestKind::Clarify), 1);
}

/// With no tools the worker fails, supervision ends, and a report is still
/// written from whatever notes exist.
#[tokio::test]
async fn missing_tools_end_supervision() {
    let model = Arc::new(FnModel::new(happy_path));
    let researcher = DeepResearcher::new(client(model.clone()), quick_config(), ToolRegistry::new());

    let ResearchOutcome::Completed(report) = researcher.run(question()).await.unwrap() else {
        panic!("expected a completed run");
    };
    match &report.exit {
        SupervisorExit::DispatchFailed(reason) => assert!(reason.contains("no tools")),
        other => panic!("unexpected exit {other:?}"),
    }
    assert_eq!(model.calls(RequestKind::Researcher), 0);
    assert_eq!(model.calls(RequestKind::FinalReport), 1);
}

#[tokio::test]
async fn scope_failure_is_an_error() {
    let model = Arc::new(FnModel::new(|kind, request| match kind {
        RequestKind::Brief => Err(LlmError::Authentication("revoked".into())),
        _ => happy_path(kind, request),
    }));
    let researcher = DeepResearcher::new(client(model), quick_config(), search_tools());

    let err = researcher.run(question()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Scope(_)));
    assert!(!err.requires_new_turn());
}

#[test]
fn researcher_keys_are_namespaced() {
    assert_eq!(researcher_key("01ABC", "raw_notes.md"), "researcher_01ABC/raw_notes.md");
}

fn stage_strategy() -> impl Strategy<Value = Stage> {
    prop_oneof![
        Just(Stage::Clarify),
        Just(Stage::WriteBrief),
        Just(Stage::Supervise),
        Just(Stage::Synthesize),
        Just(Stage::Halted),
        Just(Stage::Done),
    ]
}

proptest! {
    /// Validation agrees with the table for every pair.
    #[test]
    fn validation_matches_table(from in stage_strategy(), to in stage_strategy()) {
        let allowed = allowed_transitions(from).contains(&to);
        prop_assert_eq!(validate_transition(from, to).is_ok(), allowed);
    }

    /// Any walk through the table reaches a terminal stage within five hops.
    #[test]
    fn walks_terminate(choices in proptest::collection::vec(0usize..4, 5)) {
        let mut stage = Stage::Clarify;
        for choice in choices {
            let next = allowed_transitions(stage);
            if next.is_empty() {
                break;
            }
            stage = next[choice % next.len()];
        }
        prop_assert!(stage.is_terminal());
    }
}
